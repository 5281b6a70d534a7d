use reqwest::{multipart, Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{SessionId, Transport, VariableLocation};
use crate::debugger::{Allocation, ProgramState};
use crate::error::{BridgeError, Result};
use crate::protocol::payload::{lenient_list, lenient_u64};
use crate::protocol::{decode_records, RawRecord, Record};

const START: &str = "start";
const LOAD_AND_RUN: &str = "code";
const COMMAND: &str = "command";
const VARIABLE: &str = "variable";
const OUTPUT: &str = "output";
const MEMORY: &str = "memory";
const STEP: &str = "step";
const CLOSE: &str = "close";

#[derive(Deserialize)]
struct StartResponse {
    #[serde(rename = "sessionToken", deserialize_with = "lenient_u64")]
    session_token: u64,
}

#[derive(Deserialize)]
struct LoadResponse {
    #[serde(default)]
    response: Option<Vec<RawRecord>>,
}

#[derive(Deserialize)]
struct OutputResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    output: Vec<String>,
}

#[derive(Deserialize)]
struct MemoryResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    memory: Vec<Allocation>,
}

#[derive(Deserialize)]
struct VariableResponse {
    #[serde(default)]
    address: Vec<RawRecord>,
    #[serde(default)]
    size: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct StepResponse {
    #[serde(rename = "programState")]
    program_state: ProgramState,
}

/// [`Transport`] over the backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: Client, mut base: Url) -> Self {
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        self.base
            .join(name)
            .map_err(|e| BridgeError::Config(format!("bad endpoint {}: {}", name, e)))
    }
}

async fn read_json<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> Result<T> {
    let body = response.error_for_status()?.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|source| BridgeError::MalformedResponse { endpoint, source })
}

impl Transport for HttpTransport {
    async fn start(&self) -> Result<SessionId> {
        let response = self.client.get(self.endpoint(START)?).send().await?;
        let started: StartResponse = read_json(START, response).await?;
        Ok(started.session_token)
    }

    async fn load_and_run(&self, session: SessionId, source: &str) -> Result<Vec<Record>> {
        let form = multipart::Form::new()
            .text("sessionToken", session.to_string())
            .text("code", source.to_string());
        let response = self
            .client
            .post(self.endpoint(LOAD_AND_RUN)?)
            .multipart(form)
            .send()
            .await?;
        let loaded: LoadResponse = read_json(LOAD_AND_RUN, response).await?;
        Ok(decode_records(loaded.response.unwrap_or_default()))
    }

    async fn command(&self, session: SessionId, text: &str) -> Result<Vec<Record>> {
        tracing::debug!(session, command = text, "sending command");
        let response = self
            .client
            .get(self.endpoint(COMMAND)?)
            .query(&[("sessionToken", session.to_string()), ("command", text.to_string())])
            .send()
            .await?;
        let records: Option<Vec<RawRecord>> = read_json(COMMAND, response).await?;
        Ok(decode_records(records.unwrap_or_default()))
    }

    async fn output(&self, session: SessionId) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint(OUTPUT)?)
            .query(&[("sessionToken", session.to_string())])
            .send()
            .await?;
        let output: OutputResponse = read_json(OUTPUT, response).await?;
        Ok(output.output)
    }

    async fn memory(&self, session: SessionId) -> Result<Vec<Allocation>> {
        let response = self
            .client
            .get(self.endpoint(MEMORY)?)
            .query(&[("sessionToken", session.to_string())])
            .send()
            .await?;
        let memory: MemoryResponse = read_json(MEMORY, response).await?;
        Ok(memory.memory)
    }

    async fn variable(&self, session: SessionId, frame: u32, name: &str) -> Result<VariableLocation> {
        let response = self
            .client
            .get(self.endpoint(VARIABLE)?)
            .query(&[
                ("sessionToken", session.to_string()),
                ("frame", frame.to_string()),
                ("name", name.to_string()),
            ])
            .send()
            .await?;
        let location: VariableResponse = read_json(VARIABLE, response).await?;
        Ok(VariableLocation {
            address: decode_records(location.address),
            size: decode_records(location.size),
        })
    }

    async fn step(&self, session: SessionId) -> Result<ProgramState> {
        let response = self
            .client
            .get(self.endpoint(STEP)?)
            .query(&[("sessionToken", session.to_string())])
            .send()
            .await?;
        let stepped: StepResponse = read_json(STEP, response).await?;
        Ok(stepped.program_state)
    }

    async fn close(&self, session: SessionId) -> Result<()> {
        self.client
            .post(self.endpoint(CLOSE)?)
            .form(&[("sessionToken", session.to_string())])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
