use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared reference to a registered node. The pool and any round owned by
/// the node hold the same instance.
pub type NodeHandle = Arc<Node>;

/// A simulated mining participant.
#[derive(Debug)]
pub struct Node {
    /// Registration order inside the pool; addresses may repeat.
    pub id: u64,
    /// Display-only network address.
    pub address: String,
    /// Attempts per turn weight (only used when weighting is enabled).
    pub hash_rate: u64,
    balance: AtomicU64,
}

impl Node {
    /// Build an unregistered node. The pool assigns its id on registration.
    pub fn new(address: impl Into<String>, hash_rate: u64) -> Self {
        Self {
            id: 0,
            address: address.into(),
            hash_rate: hash_rate.max(1),
            balance: AtomicU64::new(0),
        }
    }

    /// Node with a random IPv4-looking address.
    pub fn with_random_address(hash_rate: u64) -> Self {
        Self::new(random_address(), hash_rate)
    }

    pub fn balance(&self) -> u64 {
        self.balance.load(Ordering::Acquire)
    }

    /// Balances only ever grow.
    pub(crate) fn credit(&self, amount: u64) {
        self.balance.fetch_add(amount, Ordering::AcqRel);
    }

    pub fn row(&self) -> NodeRow {
        NodeRow {
            id: self.id,
            address: self.address.clone(),
            hash_rate: self.hash_rate,
            balance: self.balance(),
        }
    }
}

/// Read-only view of a node, for the node table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeRow {
    pub id: u64,
    pub address: String,
    pub hash_rate: u64,
    pub balance: u64,
}

/// Random dotted-quad address, e.g. `"10.27.191.4"`.
pub fn random_address() -> String {
    let mut rng = rand::thread_rng();
    let octets: [u8; 4] = rng.r#gen();
    octets
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::{Node, random_address};
    use std::net::Ipv4Addr;

    #[test]
    fn random_address_is_ipv4() {
        for _ in 0..32 {
            let addr = random_address();
            assert!(addr.parse::<Ipv4Addr>().is_ok(), "bad address {addr}");
        }
    }

    #[test]
    fn credit_accumulates() {
        let node = Node::new("1.2.3.4", 10);
        assert_eq!(node.balance(), 0);
        node.credit(20);
        node.credit(20);
        assert_eq!(node.balance(), 40);
        assert_eq!(node.row().balance, 40);
    }

    #[test]
    fn hash_rate_is_positive() {
        assert_eq!(Node::new("x", 0).hash_rate, 1);
        assert_eq!(Node::with_random_address(7).hash_rate, 7);
    }
}
