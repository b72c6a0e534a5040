//! Stateless pub-sub plumbing for engine events.
//!
//! Handlers only ever see the event itself, never engine state. They run on their own tasks, so a slow push
//! notification or a failing HTTP call never holds up the request that triggered it.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { name, listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(self) {
        let Self { name, mut listener, sender, handler } = self;
        debug!("📬️ Starting {name} handler");
        // Without this the channel never closes, because we would be holding a sender ourselves.
        drop(sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = listener.recv().await {
            trace!("📬️ {name} event received");
            let handler = Arc::clone(&handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap whatever has already finished so the set doesn't grow without bound
            while let Some(res) = jobs.try_join_next() {
                log_join_result(name, res);
            }
        }
        debug!("📬️ All {name} producers have gone away. Waiting for {} jobs to complete", jobs.len());
        while let Some(res) = jobs.join_next().await {
            log_join_result(name, res);
        }
        debug!("📬️ {name} handler has shut down");
    }
}

fn log_join_result(name: &str, res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!("📬️ A {name} handler job did not complete. {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    };

    use super::*;

    #[tokio::test]
    async fn every_published_event_is_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let t2 = total.clone();
        let handler: Handler<u64> = Arc::new(move |v| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                total.fetch_add(v, Ordering::SeqCst);
            })
        });
        let event_handler = EventHandler::new("test", 1, handler);
        let merchants = event_handler.subscribe();
        let drivers = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1, 3, 5, 7, 9] {
                merchants.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0, 2, 4, 6, 8] {
                drivers.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(t2.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn a_panicking_handler_does_not_stop_the_others() {
        let _ = env_logger::try_init();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s2 = seen.clone();
        let handler: Handler<&'static str> = Arc::new(move |v| {
            let seen = seen.clone();
            Box::pin(async move {
                if v == "boom" {
                    panic!("handler failed");
                }
                seen.lock().unwrap().push(v);
            })
        });
        let event_handler = EventHandler::new("test", 4, handler);
        let producer = event_handler.subscribe();
        tokio::spawn(async move {
            for v in ["paid", "boom", "delivered"] {
                producer.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        let mut seen = s2.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["delivered", "paid"]);
    }
}
