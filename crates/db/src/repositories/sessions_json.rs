use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tablebook_core::domain::session::{Session, SessionId};

use super::{RepositoryError, SessionRepository};

/// One pretty-printed JSON file per session: `<dir>/<session_id>.json`.
#[derive(Clone, Debug)]
pub struct JsonSessionRepository {
    dir: PathBuf,
}

impl JsonSessionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &SessionId) -> Option<PathBuf> {
        id.is_well_formed().then(|| self.dir.join(format!("{}.json", id.as_str())))
    }
}

#[async_trait]
impl SessionRepository for JsonSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let Some(path) = self.file_for(id) else {
            return Ok(None);
        };
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(RepositoryError::io(path, error)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let path = self.file_for(&session.session_id).ok_or_else(|| {
            RepositoryError::Decode(format!("session id `{}` is not file-safe", session.session_id))
        })?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|error| RepositoryError::io(&self.dir, error))?;

        let json = serde_json::to_string_pretty(&session)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await.map_err(|error| RepositoryError::io(&staging, error))?;
        tokio::fs::rename(&staging, &path).await.map_err(|error| RepositoryError::io(&path, error))
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let Some(path) = self.file_for(id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(RepositoryError::io(path, error)),
        }
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(RepositoryError::io(&self.dir, error)),
        };

        let mut ids = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|error| RepositoryError::io(&self.dir, error))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(SessionId(stem.to_string()));
            }
        }
        ids.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(ids)
    }
}
