use crate::client::authenticator::Session;
use crate::consts::{
    BATCH_EXECUTE_ENDPOINT, DATA_ENDPOINT, FORM_REQUEST_KEY, FORM_TOKEN_KEY, MUTATE_ENDPOINT,
};
use crate::errors::{APIError, Result};
use crate::remote::Client;
use crate::remote::api_session::{HttpRequest, RequestBody};
use crate::remote::envelope;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

/// Every RPC method this client speaks. Opcode numbers and keys are a contract
/// with the current revision of the service, not something validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcId {
    AlbumList,
    PhotoList,
    AlbumPhotoList,
    CreateAlbum,
    AddToAlbum,
    AddToSharedAlbum,
    DeleteAlbum,
    RemoveFromAlbum,
    TrashPhotos,
    PhotoDetails,
    PhotoInfo,
    EditDescription,
    EditCreatedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Batch(&'static str),
    Data(u32),
    Mutate(u32),
}

impl RpcId {
    #[must_use]
    pub const fn envelope(self) -> Envelope {
        match self {
            RpcId::AlbumList => Envelope::Batch("Z5xsfc"),
            RpcId::PhotoList => Envelope::Batch("lcxiM"),
            RpcId::AlbumPhotoList => Envelope::Data(71_837_398),
            RpcId::CreateAlbum | RpcId::AddToAlbum => Envelope::Mutate(79_956_622),
            RpcId::AddToSharedAlbum => Envelope::Mutate(99_484_733),
            RpcId::DeleteAlbum => Envelope::Mutate(85_534_195),
            RpcId::RemoveFromAlbum => Envelope::Batch("ycV3Nd"),
            RpcId::TrashPhotos => Envelope::Batch("XwAOJf"),
            RpcId::PhotoDetails => Envelope::Batch("fDcn4b"),
            RpcId::PhotoInfo => Envelope::Batch("VrseUb"),
            RpcId::EditDescription => Envelope::Batch("AQNOFd"),
            RpcId::EditCreatedDate => Envelope::Batch("DaSgWe"),
        }
    }

    /// Key under which the call's result appears in the response.
    #[must_use]
    pub fn key(self) -> String {
        match self.envelope() {
            Envelope::Batch(key) => key.to_owned(),
            Envelope::Data(opcode) | Envelope::Mutate(opcode) => opcode.to_string(),
        }
    }
}

/// A typed request/response pair for one opcode.
pub(crate) trait RpcCall {
    const ID: RpcId;
    /// Mutations whose response body carries nothing of interest.
    const IGNORE_RESULT: bool = false;
    type Output;

    fn args(&self) -> Value;
    fn decode(payload: Value) -> Result<Self::Output>;
}

/// Calls that travel in a batch-execute envelope and can be multiplexed.
pub(crate) trait Batchable: RpcCall {}

#[derive(Debug, Default)]
pub(crate) struct Batch {
    calls: Vec<(&'static str, Value)>,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with<C: Batchable>(mut self, call: &C) -> Self {
        if let Envelope::Batch(key) = C::ID.envelope() {
            self.calls.push((key, call.args()));
        }
        self
    }
}

#[derive(Debug)]
pub(crate) struct BatchResults {
    payloads: HashMap<String, Value>,
}

impl BatchResults {
    pub(crate) fn take<C: Batchable>(&mut self) -> Result<C::Output> {
        let key = C::ID.key();
        let payload = self
            .payloads
            .remove(&key)
            .ok_or_else(|| APIError::malformed(format!("batch response has no frame for {key}")))?;
        C::decode(payload)
    }
}

impl Client {
    async fn send_query(&self, session: &Session, endpoint: &str, freq: String) -> Result<String> {
        let url = self.config.photos_url(endpoint)?;
        let request = HttpRequest::post(
            url,
            RequestBody::Form(vec![
                (FORM_REQUEST_KEY.to_owned(), freq),
                (FORM_TOKEN_KEY.to_owned(), session.auth_token().to_owned()),
            ]),
        );

        let response = self.transport.send(request).await?;
        if !response.is_ok() {
            return Err(APIError::RequestFailed {
                status: response.status,
            });
        }
        Ok(response.body)
    }

    pub(crate) async fn send_data_query(
        &self,
        session: &Session,
        opcode: u32,
        args: Value,
    ) -> Result<Value> {
        debug!("data query {opcode}");
        let body = self
            .send_query(session, DATA_ENDPOINT, envelope::encode_data_query(opcode, args))
            .await?;
        envelope::decode_data_response(&body, opcode)
    }

    pub(crate) async fn send_mutate_query(
        &self,
        session: &Session,
        opcode: u32,
        args: Value,
        ignore_result: bool,
    ) -> Result<Value> {
        debug!("mutate query {opcode}");
        let body = self
            .send_query(
                session,
                MUTATE_ENDPOINT,
                envelope::encode_mutate_query(opcode, args),
            )
            .await?;
        if ignore_result {
            return Ok(Value::Null);
        }
        envelope::decode_mutate_response(&body, opcode)
    }

    pub(crate) async fn send_batch_execute(
        &self,
        session: &Session,
        batch: Batch,
    ) -> Result<BatchResults> {
        debug!(
            "batchexecute {:?}",
            batch.calls.iter().map(|(k, _)| *k).collect::<Vec<_>>()
        );
        let freq = envelope::encode_batch(batch.calls.iter().map(|(k, v)| (*k, v)));
        let body = self
            .send_query(session, BATCH_EXECUTE_ENDPOINT, freq)
            .await?;
        Ok(BatchResults {
            payloads: envelope::decode_batch(&body)?,
        })
    }

    /// Sends one call in the envelope its opcode requires and decodes the result.
    pub(crate) async fn call<C: RpcCall>(&self, session: &Session, call: &C) -> Result<C::Output> {
        let payload = match C::ID.envelope() {
            Envelope::Data(opcode) => self.send_data_query(session, opcode, call.args()).await?,
            Envelope::Mutate(opcode) => {
                self.send_mutate_query(session, opcode, call.args(), C::IGNORE_RESULT)
                    .await?
            }
            Envelope::Batch(key) => {
                let mut batch = Batch::new();
                batch.calls.push((key, call.args()));
                let mut results = self.send_batch_execute(session, batch).await?;
                if C::IGNORE_RESULT {
                    Value::Null
                } else {
                    results.payloads.remove(key).ok_or_else(|| {
                        APIError::malformed(format!("batch response has no frame for {key}"))
                    })?
                }
            }
        };
        C::decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_and_unshared_add_use_distinct_opcodes() {
        assert_eq!(RpcId::AddToAlbum.key(), "79956622");
        assert_eq!(RpcId::AddToSharedAlbum.key(), "99484733");
        assert_eq!(RpcId::CreateAlbum.envelope(), RpcId::AddToAlbum.envelope());
        assert_eq!(RpcId::PhotoInfo.key(), "VrseUb");
    }
}
