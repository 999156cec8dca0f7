use super::repo_tx_mysql::MySqlTx;
use crate::application_port::RelationError;
use crate::domain_model::FriendStatus;
use crate::domain_port::*;
use sqlx::mysql::MySqlDatabaseError;

pub fn downcast<'a, 't>(
    tx: &'a mut dyn StorageTx<'t>,
) -> Result<&'a mut MySqlTx<'t>, RelationError> {
    // owned transactions belong to another backend
    if tx.as_any_mut().is_some() {
        return Err(RelationError::Store(
            "mysql repo used with a foreign transaction".to_owned(),
        ));
    }
    unsafe {
        let p = tx as *mut dyn StorageTx<'t>;
        let p = p as *mut MySqlTx<'t>;
        Ok(&mut *p)
    }
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

pub fn decode_status(code: i8) -> Result<FriendStatus, RelationError> {
    u8::try_from(code)
        .map_err(|e| RelationError::store("decode friend status", e))
        .and_then(|c| FriendStatus::try_from(c).map_err(RelationError::Store))
}

pub fn encode_status(status: FriendStatus) -> i8 {
    u8::from(status) as i8
}
