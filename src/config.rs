/*!
Configuration: a TOML file whose every field is optional, layered over
built-in defaults.
*/
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_ENV_VAR: &str = "ATTENDD_CONFIG";

#[derive(Deserialize)]
struct ConfigFile {
    db_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    admin_uname: Option<String>,
    admin_password: Option<String>,
    admin_email: Option<String>,
    default_academic_year: Option<String>,
    default_semester: Option<String>,
    min_password_length: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Cfg {
    /// Workspace directory holding the SQLite file when serving HTTP.
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub default_admin_uname: String,
    pub default_admin_password: String,
    pub default_admin_email: String,
    pub default_academic_year: String,
    pub default_semester: String,
    pub min_password_length: usize,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("attendd-data"),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8001),
            default_admin_uname: "admin".to_owned(),
            default_admin_password: "change-me-admin".to_owned(),
            default_admin_email: "admin@attendd.invalid".to_owned(),
            default_academic_year: "2024-2025".to_owned(),
            default_semester: "3".to_owned(),
            min_password_length: 8,
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file {}: {}", path.display(), &e))?;
        Self::from_toml_str(&file_contents)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_path {
            c.db_path = PathBuf::from(s);
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse()
                    .map_err(|e| format!("Error parsing {:?} as IP address: {}", &s, &e))?,
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.admin_uname {
            c.default_admin_uname = s;
        }
        if let Some(s) = cf.admin_password {
            c.default_admin_password = s;
        }
        if let Some(s) = cf.admin_email {
            c.default_admin_email = s;
        }
        if let Some(s) = cf.default_academic_year {
            c.default_academic_year = s;
        }
        if let Some(s) = cf.default_semester {
            c.default_semester = s;
        }
        if let Some(n) = cf.min_password_length {
            if n == 0 {
                return Err("min_password_length must be at least 1".to_owned());
            }
            c.min_password_length = n;
        }

        Ok(c)
    }

    /// Loads the file named on the command line, else the one named by
    /// `ATTENDD_CONFIG`, else falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        if let Some(p) = explicit {
            return Self::from_file(p);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(p) if !p.is_empty() => Self::from_file(PathBuf::from(p)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_keeps_defaults() {
        let c = Cfg::from_toml_str("").expect("parse");
        let d = Cfg::default();
        assert_eq!(c.addr, d.addr);
        assert_eq!(c.default_semester, "3");
        assert_eq!(c.min_password_length, 8);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            f,
            r#"
db_path = "/var/lib/attendd"
host = "127.0.0.1"
port = 9090
admin_uname = "root"
default_academic_year = "2025-2026"
min_password_length = 12
"#
        )
        .expect("write config");

        let c = Cfg::from_file(f.path()).expect("load");
        assert_eq!(c.db_path, PathBuf::from("/var/lib/attendd"));
        assert_eq!(c.addr.to_string(), "127.0.0.1:9090");
        assert_eq!(c.default_admin_uname, "root");
        assert_eq!(c.default_academic_year, "2025-2026");
        assert_eq!(c.default_semester, "3");
        assert_eq!(c.min_password_length, 12);
    }

    #[test]
    fn bad_host_is_rejected() {
        let err = Cfg::from_toml_str("host = \"not-an-ip\"").unwrap_err();
        assert!(err.contains("not-an-ip"));
    }
}
