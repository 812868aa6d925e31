/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the cluster inventory.

use crate::dal::DAL;
use crate::error::{Error, Result};
use diesel::prelude::*;
use keel_models::models::clusters::{
    Cluster, ClusterKey, ClusterRecord, NewClusterRecord, NewServerRecord, Server, ServerRecord,
};
use keel_models::schema::{cluster_servers, clusters};

pub struct ClustersDAL<'a> {
    pub(crate) dal: &'a DAL,
}

fn load_cluster(conn: &mut PgConnection, key: &ClusterKey) -> Result<Cluster> {
    let record = clusters::table
        .filter(clusters::account_id.eq(&key.account_id))
        .filter(clusters::cluster_name.eq(&key.cluster_name))
        .select(ClusterRecord::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("cluster {} not found", key)))?;

    let servers = cluster_servers::table
        .filter(cluster_servers::account_id.eq(&key.account_id))
        .filter(cluster_servers::cluster_name.eq(&key.cluster_name))
        .order(cluster_servers::hostname.asc())
        .select(ServerRecord::as_select())
        .load(conn)?;

    Ok(record.into_cluster(servers))
}

impl<'a> ClustersDAL<'a> {
    /// Retrieves a cluster and its servers.
    pub fn get(&self, key: &ClusterKey) -> Result<Cluster> {
        let conn = &mut self.dal.pool.get()?;
        load_cluster(conn, key)
    }

    /// Registers a cluster, replacing the server inventory of an existing one.
    pub fn upsert(&self, key: &ClusterKey, servers: &[Server]) -> Result<Cluster> {
        let rows = servers
            .iter()
            .map(|server| NewServerRecord::new(key, server))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(Error::Validation)?;

        let conn = &mut self.dal.pool.get()?;
        conn.transaction(|conn| {
            diesel::insert_into(clusters::table)
                .values(&NewClusterRecord::from(key))
                .on_conflict_do_nothing()
                .execute(conn)?;
            diesel::delete(
                cluster_servers::table
                    .filter(cluster_servers::account_id.eq(&key.account_id))
                    .filter(cluster_servers::cluster_name.eq(&key.cluster_name)),
            )
            .execute(conn)?;
            if !rows.is_empty() {
                diesel::insert_into(cluster_servers::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            load_cluster(conn, key)
        })
    }
}
