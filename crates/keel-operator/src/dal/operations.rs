/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the operation ledger.

use crate::dal::DAL;
use crate::error::{Error, Result};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use keel_models::models::clusters::ClusterKey;
use keel_models::models::operations::{
    NewOperation, OperationKey, OperationRecord, OperationState, UpdateConfigOperation,
};
use keel_models::schema::operations;

pub struct OperationsDAL<'a> {
    pub(crate) dal: &'a DAL,
}

fn to_operation(record: OperationRecord) -> Result<UpdateConfigOperation> {
    UpdateConfigOperation::try_from(record).map_err(Error::Storage)
}

impl<'a> OperationsDAL<'a> {
    /// Records a new operation.
    ///
    /// Fails with `Error::Conflict` while another update-config operation of
    /// the same cluster is in progress.
    pub fn create(&self, operation: &UpdateConfigOperation) -> Result<OperationKey> {
        let conn = &mut self.dal.pool.get()?;
        match diesel::insert_into(operations::table)
            .values(&NewOperation::from(operation))
            .execute(conn)
        {
            Ok(_) => Ok(operation.key()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(Error::Conflict(format!(
                    "another update-config operation is in progress for cluster {}",
                    operation.cluster_key()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, key: &OperationKey) -> Result<UpdateConfigOperation> {
        let conn = &mut self.dal.pool.get()?;
        let record = operations::table
            .filter(operations::id.eq(key.operation_id))
            .filter(operations::account_id.eq(&key.account_id))
            .filter(operations::cluster_name.eq(&key.cluster_name))
            .select(OperationRecord::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("operation {} not found", key)))?;
        to_operation(record)
    }

    /// Lists the operations of a cluster, newest first.
    pub fn list(&self, key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>> {
        let conn = &mut self.dal.pool.get()?;
        operations::table
            .filter(operations::account_id.eq(&key.account_id))
            .filter(operations::cluster_name.eq(&key.cluster_name))
            .order(operations::created_at.desc())
            .select(OperationRecord::as_select())
            .load(conn)?
            .into_iter()
            .map(to_operation)
            .collect()
    }

    pub fn set_state(
        &self,
        key: &OperationKey,
        state: OperationState,
    ) -> Result<UpdateConfigOperation> {
        let conn = &mut self.dal.pool.get()?;
        let record = diesel::update(
            operations::table
                .filter(operations::id.eq(key.operation_id))
                .filter(operations::account_id.eq(&key.account_id))
                .filter(operations::cluster_name.eq(&key.cluster_name)),
        )
        .set((
            operations::state.eq(state.as_str()),
            operations::updated_at.eq(Utc::now()),
        ))
        .returning(OperationRecord::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("operation {} not found", key)))?;
        to_operation(record)
    }
}
