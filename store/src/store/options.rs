use std::env;

/// Connection parameters for the person store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub pool_size: usize,
}

// Implements: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
impl StoreOptions {
    pub fn set_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    pub fn set_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn set_dbname(mut self, dbname: String) -> Self {
        self.dbname = dbname;
        self
    }

    pub fn set_user(mut self, user: String) -> Self {
        self.user = user;
        self
    }

    pub fn set_password(mut self, password: String) -> Self {
        self.password = password;
        self
    }

    /// Upper bound on concurrently checked-out connections. One connection
    /// is held per in-flight request.
    pub fn set_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Reads the `PERSONDB_DB_*` environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = StoreOptions::default();

        StoreOptions {
            host: env::var("PERSONDB_DB_HOST").unwrap_or(defaults.host),
            port: env::var("PERSONDB_DB_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            dbname: env::var("PERSONDB_DB_NAME").unwrap_or(defaults.dbname),
            user: env::var("PERSONDB_DB_USER").unwrap_or(defaults.user),
            password: env::var("PERSONDB_DB_PASSWORD").unwrap_or(defaults.password),
            pool_size: env::var("PERSONDB_DB_POOL_SIZE")
                .ok()
                .and_then(|size| size.parse().ok())
                .unwrap_or(defaults.pool_size),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "persondb".to_string(),
            user: "persondb".to_string(),
            password: "persondb".to_string(),
            pool_size: 16,
        }
    }
}
