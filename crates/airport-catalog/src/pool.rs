//! Pool of HTTP clients used to fetch schema content by URL.
//!
//! Clients are checked out for the duration of one fetch and go back to the
//! pool when the guard drops, whichever way the fetch exits.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use reqwest::Client;

use airport_flight::headers::CLIENT_NAME;

#[derive(Debug)]
pub struct ClientPool {
    idle: Mutex<Vec<Client>>,
    max_idle: usize,
    checked_out: AtomicUsize,
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ClientPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            checked_out: AtomicUsize::new(0),
        }
    }

    /// Check out an idle client, building one when none is available.
    pub fn acquire(&self) -> Result<PooledClient<'_>, reqwest::Error> {
        let client = match self.idle.lock().pop() {
            Some(client) => client,
            None => Client::builder().user_agent(CLIENT_NAME).build()?,
        };
        self.checked_out.fetch_add(1, Ordering::Relaxed);
        Ok(PooledClient { pool: self, client })
    }

    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::Relaxed)
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, client: Client) {
        self.checked_out.fetch_sub(1, Ordering::Relaxed);
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(client);
        }
    }
}

/// A checked-out client; returned to its pool on drop.
pub struct PooledClient<'a> {
    pool: &'a ClientPool,
    client: Client,
}

impl Deref for PooledClient<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl Drop for PooledClient<'_> {
    fn drop(&mut self) {
        // Clones share one connection pool.
        self.pool.release(self.client.clone());
    }
}
