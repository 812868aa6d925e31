/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Keel Operator
//!
//! Control-plane core of the keel cluster manager.
//!
//! - [`ops::Operator`] records configuration changes as tracked operations,
//!   serves and replaces the cluster configuration and keeps the controller
//!   service in line with it.
//! - [`rpc::status`] polls the agent of every node concurrently and folds the
//!   answers into one fleet status.
//!
//! Storage, Kubernetes and agent RPC are reached through the traits in
//! [`storage`] and [`rpc`]. In-memory, PostgreSQL ([`dal`]), Kubernetes
//! ([`k8s`]) and HTTP ([`rpc::http`]) implementations ship with the crate.

pub mod api;
pub mod cli;
pub mod dal;
pub mod db;
pub mod error;
pub mod k8s;
pub mod metrics;
pub mod ops;
pub mod rpc;
pub mod storage;
