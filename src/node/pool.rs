use log::debug;
use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::model::{Node, NodeHandle, NodeRow};
use crate::error::{MiningError, Result};

/// Registered nodes plus the rotation queue that search attempts draw from.
///
/// Every node in the queue is also registered; a node taken with
/// [`NodePool::take_turn`] is absent from the queue until it is handed back
/// with [`NodePool::return_turn`].
pub struct NodePool {
    registered: Mutex<Vec<NodeHandle>>,
    turn_tx: mpsc::UnboundedSender<NodeHandle>,
    turn_rx: AsyncMutex<mpsc::UnboundedReceiver<NodeHandle>>,
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePool {
    pub fn new() -> Self {
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        Self {
            registered: Mutex::new(Vec::new()),
            turn_tx,
            turn_rx: AsyncMutex::new(turn_rx),
        }
    }

    /// Add a node to the registry and to the rotation queue.
    pub fn register(&self, mut node: Node) -> NodeHandle {
        let handle = {
            let mut registered = self.registered.lock().expect("mutex poisoned");
            node.id = registered.len() as u64;
            let handle = NodeHandle::new(node);
            registered.push(handle.clone());
            handle
        };
        debug!(
            "POOL - registered node #{} ({}, {} H/turn)",
            handle.id, handle.address, handle.hash_rate
        );
        self.return_turn(handle.clone());
        handle
    }

    /// Wait until a node is free in the rotation queue and take it.
    pub async fn take_turn(&self) -> Result<NodeHandle> {
        if self.is_empty() {
            return Err(MiningError::EmptyPool);
        }
        let mut rx = self.turn_rx.lock().await;
        rx.recv().await.ok_or(MiningError::EmptyPool)
    }

    /// Put a node back at the end of the rotation queue.
    pub fn return_turn(&self, node: NodeHandle) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.turn_tx.send(node);
    }

    pub fn get(&self, id: u64) -> Option<NodeHandle> {
        let registered = self.registered.lock().expect("mutex poisoned");
        registered.get(id as usize).cloned()
    }

    /// The most recently registered node.
    pub fn latest(&self) -> Option<NodeHandle> {
        let registered = self.registered.lock().expect("mutex poisoned");
        registered.last().cloned()
    }

    pub fn table(&self) -> Vec<NodeRow> {
        let registered = self.registered.lock().expect("mutex poisoned");
        registered.iter().map(|n| n.row()).collect()
    }

    pub fn total_balance(&self) -> u64 {
        let registered = self.registered.lock().expect("mutex poisoned");
        registered.iter().map(|n| n.balance()).sum()
    }

    pub fn len(&self) -> usize {
        self.registered.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
