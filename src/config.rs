use clap::ValueEnum;

/// How `packet` rows get their identity.
///
/// The schema accepts either a database-assigned id or one minted by the
/// worker; both code paths are kept and selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PacketIdMode {
    /// The database assigns the id; the insert returns it.
    Generated,
    /// The worker mints a v4 UUID and supplies it with the insert.
    ClientUuid,
}

/// Everything one worker instance needs to run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub nats_url: String,
    pub stream: String,
    pub subject: String,
    pub consumer_name: String,
    pub database_url: String,
    pub redis_url: String,
    /// Default TTL for the entity ID caches, seconds.
    pub cache_ttl: u64,
    /// Drop a deferred packet once its retries are exhausted instead of
    /// blocking the queue on it.
    pub drop_defer: bool,
    /// Store stats report interval, seconds.
    pub report_interval: u64,
    pub packet_id_mode: PacketIdMode,
    /// Prometheus listener port; disabled when unset.
    pub metrics_port: Option<u16>,
}
