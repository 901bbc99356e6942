//! [`PvClient`] backed by the EPICS base command-line tools.
//!
//! Channel Access uses `cainfo`, `caget` and `caput`; pvAccess uses
//! `pvinfo`, `pvget` and `pvput`. A channel is "opened" by probing the PV
//! with the info tool, which also yields the native type of its value
//! field. Every command runs under a timeout and is killed if it hangs.

use crate::provider::is_scalar_type_id;
use pvkeys_engine::{ClientError, Field, Number, PvClient, RemoteType, TypedValue};
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};
use wait_timeout::ChildExt;

/// Extra time given to a tool beyond its own `-w` connection timeout.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Significant digits requested from `caget`. Its default `%g` keeps only six,
/// which would round the reading an increment is added to.
const CAGET_PRECISION: &str = "17";

/// Which family of tools to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    ChannelAccess,
    PvAccess,
}

/// Builder for a tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: &'static str,
    args: Vec<String>,
}

impl ToolCommand {
    fn new(program: &'static str) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    fn flag(mut self, flag: &str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    fn flag_with_value(mut self, flag: &str, value: &str) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn program(&self) -> &str {
        self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Info query for `pv`.
    pub fn info(kind: ToolKind, pv: &str, wait: Duration) -> Self {
        let program = match kind {
            ToolKind::ChannelAccess => "cainfo",
            ToolKind::PvAccess => "pvinfo",
        };
        Self::new(program)
            .flag_with_value("-w", &wait_arg(wait))
            .arg("--")
            .arg(pv)
    }

    /// Numeric read of `field`.
    pub fn get(kind: ToolKind, pv: &str, field: Field, wait: Duration) -> Self {
        match kind {
            // -n prints enums as their index
            ToolKind::ChannelAccess => Self::new("caget")
                .flag("-t")
                .flag("-n")
                .flag_with_value("-g", CAGET_PRECISION)
                .flag_with_value("-w", &wait_arg(wait))
                .arg("--")
                .arg(pv),
            ToolKind::PvAccess => Self::new("pvget")
                .flag_with_value("-w", &wait_arg(wait))
                .flag_with_value("-M", "json")
                .flag_with_value("-r", &format!("field({})", field.path()))
                .arg("--")
                .arg(pv),
        }
    }

    /// Write of `value` to `field`.
    pub fn put(kind: ToolKind, pv: &str, field: Field, value: &TypedValue, wait: Duration) -> Self {
        match kind {
            ToolKind::ChannelAccess => {
                let mut cmd = Self::new("caput")
                    .flag("-t")
                    .flag_with_value("-w", &wait_arg(wait));
                if field == Field::ValueIndex {
                    cmd = cmd.flag("-n");
                }
                let text = match value {
                    TypedValue::Boolean(b) => u8::from(*b).to_string(),
                    other => other.to_string(),
                };
                cmd.arg("--").arg(pv).arg(&text)
            }
            ToolKind::PvAccess => Self::new("pvput")
                .flag_with_value("-w", &wait_arg(wait))
                .arg("--")
                .arg(pv)
                .arg(&format!("{}={}", field.path(), value)),
        }
    }
}

fn wait_arg(wait: Duration) -> String {
    format!("{}", wait.as_secs_f64())
}

/// Channel opened by [`ToolClient`]. Holds the type reported by the info tool.
#[derive(Clone, Debug)]
pub struct ToolChannel {
    name: String,
    native: NativeType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum NativeType {
    Scalar(RemoteType),
    Unsupported(String),
}

impl ToolChannel {
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct ToolClient {
    kind: ToolKind,
    timeout: Duration,
}

impl ToolClient {
    pub fn new(kind: ToolKind, timeout: Duration) -> Self {
        ToolClient { kind, timeout }
    }

    fn run(&self, cmd: &ToolCommand) -> Result<String, ClientError> {
        trace!(program = cmd.program(), args = ?cmd.args(), "running tool");
        let mut child = Command::new(cmd.program())
            .args(cmd.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    ClientError::Failed(format!("'{}' not found on PATH", cmd.program()))
                } else {
                    ClientError::Io(err)
                }
            })?;

        // Drain both pipes while waiting so a chatty tool cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let limit = self.timeout + KILL_GRACE;
        let Some(status) = child.wait_timeout(limit)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ClientError::Timeout(limit));
        };

        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;

        if status.success() {
            Ok(stdout)
        } else {
            let detail = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("no output");
            Err(ClientError::Failed(format!(
                "{} exited with {}: {}",
                cmd.program(),
                status,
                detail
            )))
        }
    }
}

type OutputReader = JoinHandle<io::Result<String>>;

fn drain<R: Read + Send + 'static>(mut pipe: R) -> OutputReader {
    thread::spawn(move || {
        let mut text = String::new();
        pipe.read_to_string(&mut text)?;
        Ok(text)
    })
}

fn collect(reader: Option<OutputReader>) -> Result<String, ClientError> {
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    let text = reader
        .join()
        .map_err(|_| ClientError::Failed("output reader panicked".to_string()))??;
    Ok(text)
}

/// A failing info query that reports the PV as missing becomes `NotFound`.
fn connect_error(name: &str, err: ClientError) -> ClientError {
    match err {
        ClientError::Failed(msg) if msg.contains("not found") && !msg.contains("on PATH") => {
            ClientError::NotFound(name.to_string())
        }
        other => other,
    }
}

impl PvClient for ToolClient {
    type Channel = ToolChannel;

    fn connect(&self, name: &str) -> Result<ToolChannel, ClientError> {
        let output = self
            .run(&ToolCommand::info(self.kind, name, self.timeout))
            .map_err(|err| connect_error(name, err))?;
        let native = match self.kind {
            ToolKind::ChannelAccess => parse_cainfo(&output),
            ToolKind::PvAccess => parse_pvinfo(&output),
        };
        debug!(pv = name, native = ?native, "connected");
        Ok(ToolChannel {
            name: name.to_string(),
            native,
        })
    }

    fn remote_type(&self, channel: &ToolChannel) -> Result<RemoteType, ClientError> {
        match &channel.native {
            NativeType::Scalar(remote_type) => Ok(remote_type.clone()),
            NativeType::Unsupported(reason) => Err(ClientError::Unsupported(reason.clone())),
        }
    }

    fn get_numeric(&self, channel: &ToolChannel, field: Field) -> Result<Number, ClientError> {
        let output = self.run(&ToolCommand::get(self.kind, &channel.name, field, self.timeout))?;
        match self.kind {
            ToolKind::ChannelAccess => parse_number(output.trim()),
            ToolKind::PvAccess => parse_pvget_json(&output, field),
        }
    }

    fn put(&self, channel: &ToolChannel, field: Field, value: &TypedValue) -> Result<(), ClientError> {
        self.run(&ToolCommand::put(
            self.kind,
            &channel.name,
            field,
            value,
            self.timeout,
        ))?;
        Ok(())
    }
}

/// Classify `cainfo` output by its `Native data type` and `Element count`.
fn parse_cainfo(output: &str) -> NativeType {
    let mut dbf: Option<&str> = None;
    let mut count: Option<u64> = None;
    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        match label.trim() {
            "Native data type" => dbf = Some(value.trim()),
            "Element count" => count = value.trim().parse().ok(),
            _ => {}
        }
    }

    let Some(dbf) = dbf else {
        return NativeType::Unsupported("no native data type in cainfo output".to_string());
    };
    if count.is_some_and(|n| n != 1) {
        return NativeType::Unsupported(format!("{} array", dbf));
    }
    let name = match dbf {
        "DBF_STRING" => "string",
        "DBF_SHORT" | "DBF_INT" => "short",
        "DBF_FLOAT" => "float",
        "DBF_ENUM" => "enum_t",
        "DBF_CHAR" => "ubyte",
        "DBF_LONG" => "int",
        "DBF_DOUBLE" => "double",
        other => return NativeType::Unsupported(format!("unknown native type {}", other)),
    };
    NativeType::Scalar(RemoteType::new(name))
}

/// Find the type id of the top-level `value` field in `pvinfo` output.
fn parse_pvinfo(output: &str) -> NativeType {
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(type_id), Some("value"), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        return if is_scalar_type_id(type_id) {
            NativeType::Scalar(RemoteType::new(type_id))
        } else {
            NativeType::Unsupported(format!("value field is {}", type_id))
        };
    }
    NativeType::Unsupported("no value field in pvinfo output".to_string())
}

fn parse_number(text: &str) -> Result<Number, ClientError> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Number::Integer(i));
    }
    text.parse::<f64>()
        .map(Number::Float)
        .map_err(|_| ClientError::Malformed(format!("'{}' is not a number", text)))
}

/// Read `field` out of `pvget -M json` output. Anything before the first `{`
/// (such as the PV name) is skipped.
fn parse_pvget_json(output: &str, field: Field) -> Result<Number, ClientError> {
    let start = output
        .find('{')
        .ok_or_else(|| ClientError::Malformed(format!("no JSON in pvget output: {}", output.trim())))?;
    let mut stream = serde_json::Deserializer::from_str(&output[start..]).into_iter::<serde_json::Value>();
    let root = stream
        .next()
        .ok_or_else(|| ClientError::Malformed("empty pvget output".to_string()))?
        .map_err(|err| ClientError::Malformed(err.to_string()))?;

    let mut node = &root;
    for segment in field.path().split('.') {
        node = node
            .get(segment)
            .ok_or_else(|| ClientError::Malformed(format!("no '{}' in pvget output", field)))?;
    }

    if let Some(i) = node.as_i64() {
        Ok(Number::Integer(i))
    } else if let Some(f) = node.as_f64() {
        Ok(Number::Float(f))
    } else {
        Err(ClientError::Malformed(format!("{} is not a number: {}", field, node)))
    }
}
