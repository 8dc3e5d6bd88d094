//! Admin session saved between invocations
//! Stored at: data/admin_session.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SESSION_FILE: &str = "data/admin_session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    pub server: String,
    pub email: String,
    pub id_token: String,
}

impl AdminSession {
    pub fn save(&self) -> anyhow::Result<()> {
        Self::save_to(self, Path::new(SESSION_FILE))
    }

    pub fn load() -> anyhow::Result<Option<Self>> {
        Self::load_from(Path::new(SESSION_FILE))
    }

    pub fn require() -> anyhow::Result<Self> {
        Self::load()?.ok_or_else(|| anyhow::anyhow!("Not signed in. Run 'symposium-admin login' first"))
    }

    pub fn clear() -> anyhow::Result<()> {
        let path = Path::new(SESSION_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn load_from(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_survives_a_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        assert!(AdminSession::load_from(&path).unwrap().is_none());

        let session = AdminSession {
            server: "http://localhost:3000".to_string(),
            email: "admin@zenith.in".to_string(),
            id_token: "token".to_string(),
        };
        session.save_to(&path).unwrap();

        let loaded = AdminSession::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.email, "admin@zenith.in");
        assert_eq!(loaded.id_token, "token");
    }
}
