//! Configuration data model: `[server]`, `[limits]`, `[files]`,
//! `[[operators]]`, `[channels]`.

use serde::Deserialize;

/// Human vs machine-readable log output, selected in `[server]` or
/// overridden by `--debug`/`--nolog` on the CLI.
#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `tracing_subscriber`'s default human-readable formatter.
    #[default]
    Pretty,
    /// One JSON object per event, for log-aggregator consumption.
    Json,
}

/// `[server]`: network identity and wire-facing defaults.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerSection {
    /// This server's name, used as the message prefix source.
    pub name: String,
    /// Network name advertised in ISUPPORT `NETWORK=`.
    pub network: String,
    /// Three-character server identifier.
    pub sid: String,
    /// Short description shown in `004`/LUSERS-style replies.
    pub description: String,
    /// `CASEMAPPING` token: one of rfc1459 / strict-rfc1459 / ascii /
    /// permissive-unicode.
    #[serde(default = "default_casemap")]
    pub casemap: String,
    /// Address to bind the client listener to.
    pub listen: String,
    /// Logging output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Connection password required via `PASS` before registration
    /// completes. `None` means no password is required.
    #[serde(default)]
    pub connect_password: Option<String>,
}

fn default_casemap() -> String {
    "rfc1459".to_string()
}

/// `[limits]`: the numeric bounds C1/C4/C5/C6 enforce.
#[derive(Clone, Debug, Deserialize)]
pub struct LimitsSection {
    /// Maximum nickname length.
    #[serde(default = "default_nick_max")]
    pub nick_max: usize,
    /// Maximum channel name length.
    #[serde(default = "default_chan_max")]
    pub chan_max: usize,
    /// Maximum topic length.
    #[serde(default = "default_topic_max")]
    pub topic_max: usize,
    /// Maximum `+k` key length.
    #[serde(default = "default_key_max")]
    pub key_max: usize,
    /// Per-list-mode (b/e/I) maximum entry count.
    #[serde(default = "default_maxlist")]
    pub maxlist: usize,
    /// Maximum mode letters folded into a single outbound MODE line.
    #[serde(default = "default_max_modes_per_line")]
    pub max_modes_per_line: usize,
    /// Maximum wire line length, excluding tags.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Default channel-count cap per connect class.
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
    /// Penalty (ms) above which a session's socket reads are suspended.
    #[serde(default = "default_penalty_threshold_ms")]
    pub penalty_threshold_ms: i64,
    /// Seconds of silence before the server sends an idle PING.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Further seconds to wait for any data after the idle PING before
    /// quitting the session with `Ping timeout`.
    #[serde(default = "default_ping_grace_secs")]
    pub ping_grace_secs: u64,
    /// Outbound writes coalesce queued messages up to this many bytes
    /// before handing the record to the socket.
    #[serde(default = "default_send_record_size")]
    pub send_record_size: usize,
    /// Maximum queued outbound messages per session before the queue
    /// counts as saturated (`SendQ exceeded`).
    #[serde(default = "default_sendq_max_msgs")]
    pub sendq_max_msgs: usize,
}

fn default_nick_max() -> usize {
    30
}
fn default_chan_max() -> usize {
    50
}
fn default_topic_max() -> usize {
    390
}
fn default_key_max() -> usize {
    32
}
fn default_maxlist() -> usize {
    100
}
fn default_max_modes_per_line() -> usize {
    4
}
fn default_max_line_length() -> usize {
    512
}
fn default_max_channels() -> usize {
    50
}
fn default_penalty_threshold_ms() -> i64 {
    10_000
}
fn default_ping_interval_secs() -> u64 {
    120
}
fn default_ping_grace_secs() -> u64 {
    60
}
fn default_send_record_size() -> usize {
    4096
}
fn default_sendq_max_msgs() -> usize {
    512
}

/// `[files]`: the only on-disk state this daemon reads/writes directly.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FilesSection {
    /// Path to the MOTD text file, re-read on rehash.
    pub motd_path: Option<String>,
    /// Path to the RULES text file.
    pub rules_path: Option<String>,
    /// PID file path, rewritten on boot.
    pub pid_path: Option<String>,
}

/// One `[[operators]]` block: name/credential/access policy.
#[derive(Clone, Debug, Deserialize)]
pub struct OperatorBlock {
    /// Oper account name (not necessarily the nick).
    pub name: String,
    /// Argon2 password hash.
    pub password_hash: String,
    /// Glob host mask the connection must match (`nick!user@host` style,
    /// host portion only).
    #[serde(default = "default_host_mask")]
    pub host_mask: String,
    /// Access policy label (e.g. "netadmin", "helper"); gates which
    /// oper-only commands the account may run.
    #[serde(default = "default_oper_type")]
    pub oper_type: String,
    /// Raised channel-count cap for this account, overriding
    /// `limits.max_channels` while opered up.
    #[serde(default)]
    pub maxchans: Option<usize>,
}

fn default_host_mask() -> String {
    "*".to_string()
}
fn default_oper_type() -> String {
    "netadmin".to_string()
}

/// `[channels]`: modes applied to a channel at creation time, plus the
/// optional PART-reason wrapping.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChannelsSection {
    /// Default mode letters, e.g. `"nt"`, applied by `attempt_join` step 5.
    #[serde(default)]
    pub default_modes: String,
    /// Text prepended to every client-supplied PART reason.
    #[serde(default)]
    pub part_prefix: Option<String>,
    /// Text appended to every client-supplied PART reason.
    #[serde(default)]
    pub part_suffix: Option<String>,
}

/// The full, validated configuration snapshot the core consumes. Loaded
/// once at boot, replaced wholesale on `REHASH`.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// `[server]`
    pub server: ServerSection,
    /// `[limits]`
    #[serde(default = "default_limits")]
    pub limits: LimitsSection,
    /// `[files]`
    #[serde(default)]
    pub files: FilesSection,
    /// `[[operators]]`
    #[serde(default)]
    pub operators: Vec<OperatorBlock>,
    /// `[channels]`
    #[serde(default)]
    pub channels: ChannelsSection,
}

fn default_limits() -> LimitsSection {
    LimitsSection::default()
}

impl Default for LimitsSection {
    fn default() -> Self {
        LimitsSection {
            nick_max: default_nick_max(),
            chan_max: default_chan_max(),
            topic_max: default_topic_max(),
            key_max: default_key_max(),
            maxlist: default_maxlist(),
            max_modes_per_line: default_max_modes_per_line(),
            max_line_length: default_max_line_length(),
            max_channels: default_max_channels(),
            penalty_threshold_ms: default_penalty_threshold_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_grace_secs: default_ping_grace_secs(),
            send_record_size: default_send_record_size(),
            sendq_max_msgs: default_sendq_max_msgs(),
        }
    }
}
