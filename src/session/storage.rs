use log::warn;
use std::fs;
use std::io;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use url::Url;

/// Query parameter that mirrors the active session id.
pub const SESSION_QUERY_PARAM: &str = "chatId";
/// Key of the durable slot holding the last active session id.
pub const SESSION_SLOT_KEY: &str = "currentChatId";

/// Client-local durable storage for the last active session id.
pub trait SessionSlot: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, session_id: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

#[derive(Default)]
pub struct MemorySessionSlot {
    value: Mutex<Option<String>>,
}

impl MemorySessionSlot {
    pub fn new(initial: Option<String>) -> Self {
        Self { value: Mutex::new(initial) }
    }
}

impl SessionSlot for MemorySessionSlot {
    fn load(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }

    fn store(&self, session_id: &str) -> io::Result<()> {
        let mut guard = self.value
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session slot poisoned"))?;
        *guard = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut guard = self.value
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session slot poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Keeps the session id in a single file named after the slot key.
pub struct FileSessionSlot {
    path: PathBuf,
}

impl FileSessionSlot {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_SLOT_KEY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSlot for FileSessionSlot {
    fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() { None } else { Some(id.to_string()) }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read session slot {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn store(&self, session_id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, session_id)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// The visible location reference. Only the session query parameter is
/// managed; other parameters are preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Ok(Self { url: Url::parse(input)? })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn session_id(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == SESSION_QUERY_PARAM)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    pub fn set_session_id(&mut self, session_id: &str) {
        let mut pairs = self.other_pairs();
        pairs.push((SESSION_QUERY_PARAM.to_string(), session_id.to_string()));
        self.replace_query(pairs);
    }

    pub fn clear_session_id(&mut self) {
        let pairs = self.other_pairs();
        self.replace_query(pairs);
    }

    fn other_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .filter(|(k, _)| k != SESSION_QUERY_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn replace_query(&mut self, pairs: Vec<(String, String)>) {
        if pairs.is_empty() {
            self.url.set_query(None);
            return;
        }
        self.url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost/chat").expect("static url parses"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_slot_round_trips_and_clears() {
        let dir = TempDir::new().unwrap();
        let slot = FileSessionSlot::new(dir.path());
        assert_eq!(slot.load(), None);
        slot.store("abc-123").unwrap();
        assert_eq!(slot.load(), Some("abc-123".to_string()));
        slot.clear().unwrap();
        assert_eq!(slot.load(), None);
        slot.clear().unwrap();
    }

    #[test]
    fn location_mirrors_session_param() {
        let mut location = Location::parse("http://localhost:3000/chat?theme=dark").unwrap();
        assert_eq!(location.session_id(), None);
        location.set_session_id("s1");
        assert_eq!(location.session_id(), Some("s1".to_string()));
        assert_eq!(location.as_str(), "http://localhost:3000/chat?theme=dark&chatId=s1");
        location.set_session_id("s2");
        assert_eq!(location.as_str(), "http://localhost:3000/chat?theme=dark&chatId=s2");
        location.clear_session_id();
        assert_eq!(location.as_str(), "http://localhost:3000/chat?theme=dark");
    }

    #[test]
    fn clearing_last_param_drops_query() {
        let mut location = Location::parse("http://localhost:3000/chat?chatId=s1").unwrap();
        assert_eq!(location.session_id(), Some("s1".to_string()));
        location.clear_session_id();
        assert_eq!(location.as_str(), "http://localhost:3000/chat");
    }
}
