//! Item actions the controller delegates to the surrounding application.

use std::future::Future;

use tokio::runtime::Handle;

use crate::api::{ApiError, FileServer, ServerClient};
use crate::listing::DirectoryEntry;

/// What the application does when the user acts on an item.
///
/// The controller only decides which item an action targets; opening players, running
/// transfers and confirming deletes happen behind this trait.
pub trait FileActionSink {
    /// A file was activated (double-click, Enter).
    fn open(&mut self, entry: &DirectoryEntry);
    fn delete(&mut self, path: &str);
    fn rename(&mut self, path: &str, new_name: &str);
    fn download(&mut self, entry: &DirectoryEntry);
    fn show_properties(&mut self, entry: &DirectoryEntry);
    fn create_folder(&mut self, parent: &str, name: &str);
    fn create_file(&mut self, parent: &str, name: &str);
}

/// Sink that ignores everything, for views without actions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActions;

impl FileActionSink for NoActions {
    fn open(&mut self, _entry: &DirectoryEntry) {}
    fn delete(&mut self, _path: &str) {}
    fn rename(&mut self, _path: &str, _new_name: &str) {}
    fn download(&mut self, _entry: &DirectoryEntry) {}
    fn show_properties(&mut self, _entry: &DirectoryEntry) {}
    fn create_folder(&mut self, _parent: &str, _name: &str) {}
    fn create_file(&mut self, _parent: &str, _name: &str) {}
}

/// Sink that runs mutations against the file server and logs the links players and
/// download managers would get.
pub struct ServerActions {
    client: ServerClient,
    runtime: Handle,
}

impl ServerActions {
    pub fn new(client: ServerClient, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    fn spawn<F>(&self, action: &'static str, target: String, request: F)
    where
        F: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        self.runtime.spawn(async move {
            match request.await {
                Ok(()) => log::info!("{action} {target}: done"),
                Err(e) => log::warn!("{action} {target} failed: {e}"),
            }
        });
    }

    fn log_link(&self, action: &str, entry: &DirectoryEntry) {
        match self.client.stream_url(&entry.path) {
            Ok(url) => log::info!("{action} {}: {url}", entry.path),
            Err(e) => log::warn!("{action} {}: no link: {e}", entry.path),
        }
    }
}

impl FileActionSink for ServerActions {
    fn open(&mut self, entry: &DirectoryEntry) {
        self.log_link("open", entry);
    }

    fn delete(&mut self, path: &str) {
        let client = self.client.clone();
        let path = path.to_string();
        self.spawn("delete", path.clone(), async move { client.delete_file(&path).await });
    }

    fn rename(&mut self, path: &str, new_name: &str) {
        let client = self.client.clone();
        let (path, new_name) = (path.to_string(), new_name.to_string());
        self.spawn("rename", path.clone(), async move {
            client.rename_file(&path, &new_name).await
        });
    }

    fn download(&mut self, entry: &DirectoryEntry) {
        self.log_link("download", entry);
    }

    fn show_properties(&mut self, entry: &DirectoryEntry) {
        let meta = self.client.get_meta(&entry.path);
        let path = entry.path.clone();
        self.runtime.spawn(async move {
            match meta.await {
                Ok(meta) => log::info!("properties {path}: {meta:?}"),
                Err(e) => log::warn!("properties {path} failed: {e}"),
            }
        });
    }

    fn create_folder(&mut self, parent: &str, name: &str) {
        let client = self.client.clone();
        let (parent, name) = (parent.to_string(), name.to_string());
        self.spawn("create folder in", parent.clone(), async move {
            client.create_folder(&parent, &name).await
        });
    }

    fn create_file(&mut self, parent: &str, name: &str) {
        let client = self.client.clone();
        let (parent, name) = (parent.to_string(), name.to_string());
        self.spawn("create file in", parent.clone(), async move {
            client.create_file(&parent, &name, None).await
        });
    }
}
