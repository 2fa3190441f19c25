//! Shutdown coordination for started listeners.

use std::io;
use std::time::Duration;

use futures_util::future::join_all;

use crate::lifecycle::startup::Servers;

impl Servers {
    /// Gracefully stop every listener, concurrently.
    ///
    /// Each listener stops accepting at once and gives open connections up
    /// to `grace` to finish. Returns the errors of listeners whose serving
    /// task did not exit cleanly.
    pub async fn shutdown(self, grace: Option<Duration>) -> Vec<io::Error> {
        let handles = self.into_handles();
        tracing::info!(listeners = handles.len(), grace = ?grace, "Draining listeners");

        let results = join_all(handles.into_iter().map(|handle| handle.shutdown(grace))).await;
        let errors: Vec<io::Error> = results.into_iter().filter_map(Result::err).collect();

        for error in &errors {
            tracing::error!(error = %error, "Listener did not shut down cleanly");
        }
        tracing::info!("Shutdown complete");
        errors
    }

    /// Stop every listener immediately without draining.
    pub fn close(&self) {
        for handle in self.iter() {
            handle.close();
        }
    }
}
