// Copyright 2023 Trestle Network
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use trestle_relayer_types::{ChainId, Message};
use trestle_relayer_utils::{Error, Result};

use crate::MessageWriter;

/// In-process registry from destination chain id to its writer.
///
/// Listeners hand every decoded message to [`Router::send`], which
/// dispatches synchronously into the destination writer. The router never
/// retries; retry policy lives in the writer.
#[derive(Default)]
pub struct Router {
    writers: RwLock<HashMap<ChainId, Arc<dyn MessageWriter>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the writer for `chain_id`, called once per chain at
    /// startup. A second registration for the same chain is a configuration
    /// error.
    pub fn register(
        &self,
        chain_id: ChainId,
        writer: Arc<dyn MessageWriter>,
    ) -> Result<()> {
        let mut writers = self.writers.write();
        if writers.contains_key(&chain_id) {
            return Err(Error::DuplicateWriter(chain_id));
        }
        writers.insert(chain_id, writer);
        Ok(())
    }

    /// Dispatches `message` to the writer registered for its destination.
    pub async fn send(&self, message: Message) -> Result<bool> {
        tracing::trace!(
            src = %message.source,
            dest = %message.destination,
            nonce = %message.deposit_nonce,
            "routing message"
        );
        let writer = self
            .writers
            .read()
            .get(&message.destination)
            .cloned()
            .ok_or(Error::WriterNotFound(message.destination))?;
        Ok(writer.resolve_message(message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use trestle_relayer_types::{DepositNonce, ResourceId};

    #[derive(Default)]
    struct RecordingWriter {
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl MessageWriter for RecordingWriter {
        async fn resolve_message(&self, message: Message) -> bool {
            self.seen.lock().push(message);
            true
        }
    }

    fn message(destination: u8, nonce: u64) -> Message {
        Message::new_generic_transfer(
            ChainId(1),
            ChainId(destination),
            DepositNonce(nonce),
            ResourceId([0u8; 32]),
            vec![],
        )
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let router = Router::new();
        let writer = Arc::new(RecordingWriter::default());
        router.register(ChainId(2), writer.clone()).unwrap();
        let err = router.register(ChainId(2), writer).unwrap_err();
        assert!(matches!(err, Error::DuplicateWriter(ChainId(2))));
    }

    #[tokio::test]
    async fn unknown_destination_is_an_error() {
        let router = Router::new();
        let err = router.send(message(9, 1)).await.unwrap_err();
        assert!(matches!(err, Error::WriterNotFound(ChainId(9))));
    }

    #[tokio::test]
    async fn dispatches_to_the_destination_writer_in_order() {
        let router = Router::new();
        let two = Arc::new(RecordingWriter::default());
        let three = Arc::new(RecordingWriter::default());
        router.register(ChainId(2), two.clone()).unwrap();
        router.register(ChainId(3), three.clone()).unwrap();

        assert!(router.send(message(2, 1)).await.unwrap());
        assert!(router.send(message(2, 2)).await.unwrap());
        assert!(router.send(message(3, 7)).await.unwrap());

        let seen = two.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].deposit_nonce, DepositNonce(1));
        assert_eq!(seen[1].deposit_nonce, DepositNonce(2));
        assert_eq!(three.seen.lock().len(), 1);
    }
}
