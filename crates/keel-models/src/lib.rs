/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data model shared by the keel crates: the cluster configuration document and
//! its merge engine, cluster inventory types, and the operation ledger records.

pub mod models;
pub mod schema;
