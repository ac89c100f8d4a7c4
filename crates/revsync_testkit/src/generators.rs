//! Property-based test generators using proptest.

use proptest::prelude::*;
use revsync_core::{Ordinal, TableName, MAX_TABLE_NAME_LEN};

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = TableName> {
    prop::string::string_regex(&format!("[a-z][a-z0-9_]{{0,{}}}", MAX_TABLE_NAME_LEN - 1))
        .expect("Invalid regex")
        .prop_map(|name| TableName::new(name).expect("generated name is valid"))
}

/// Strategy for generating cursors.
pub fn ordinal_strategy() -> impl Strategy<Value = Ordinal> {
    (0u64..10_000).prop_map(Ordinal::new)
}

/// Strategy for generating human-ish site names.
pub fn site_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,10}").expect("Invalid regex")
}

/// One step of a multi-client sync scenario.
///
/// Record indices select among the client's current local records, modulo
/// their count; operations on a client without records are skipped.
#[derive(Debug, Clone)]
pub enum ClientOp {
    /// Create a new site.
    Create {
        /// Acting client.
        client: usize,
        /// Site name.
        name: String,
    },
    /// Rename an existing local site.
    Update {
        /// Acting client.
        client: usize,
        /// Record selector.
        index: usize,
        /// New name.
        name: String,
    },
    /// Delete an existing local site.
    Delete {
        /// Acting client.
        client: usize,
        /// Record selector.
        index: usize,
    },
    /// Push pending edits, then pull.
    Sync {
        /// Acting client.
        client: usize,
    },
}

/// Strategy for one scenario step among `clients` clients.
pub fn client_op_strategy(clients: usize) -> impl Strategy<Value = ClientOp> {
    let clients = clients.max(1);
    prop_oneof![
        1 => (0..clients, site_name_strategy())
            .prop_map(|(client, name)| ClientOp::Create { client, name }),
        1 => (0..clients, any::<usize>(), site_name_strategy())
            .prop_map(|(client, index, name)| ClientOp::Update { client, index, name }),
        1 => (0..clients, any::<usize>())
            .prop_map(|(client, index)| ClientOp::Delete { client, index }),
        2 => (0..clients).prop_map(|client| ClientOp::Sync { client }),
    ]
}
