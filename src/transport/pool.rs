use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{HttpResponse, Transport, TransportError};
use crate::wire::SoapCall;

type Factory<T> = Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>;

struct Slot<T> {
    transport: Option<Arc<T>>,
    request_count: u32,
}

/// Owns one transport and replaces it after `max_requests` calls, so that the
/// client certificate and the connections are refreshed periodically.
///
/// A call in flight keeps its own handle, so recycling never interrupts it.
pub struct ClientPool<T> {
    factory: Factory<T>,
    max_requests: u32,
    slot: Mutex<Slot<T>>,
}

impl<T: Transport> ClientPool<T> {
    pub fn new(
        max_requests: u32,
        factory: impl Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            max_requests,
            slot: Mutex::new(Slot {
                transport: None,
                request_count: 0,
            }),
        }
    }

    /// A transport that served `request_count` requests is due for replacement.
    pub fn should_recycle(&self, request_count: u32) -> bool {
        request_count >= self.max_requests
    }

    /// Replace the current transport right away.
    pub fn renew(&self) -> Result<(), TransportError> {
        let mut slot = self.lock();
        slot.transport = Some(Arc::new(self.build()?));
        slot.request_count = 0;
        Ok(())
    }

    /// Drop the current transport. The next call builds a new one.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.transport = None;
        slot.request_count = 0;
    }

    pub fn request_count(&self) -> u32 {
        self.lock().request_count
    }

    fn acquire(&self) -> Result<Arc<T>, TransportError> {
        let mut slot = self.lock();
        if slot.transport.is_some() && self.should_recycle(slot.request_count) {
            tracing::debug!(
                "recycling transport after {} requests",
                slot.request_count
            );
            slot.transport = None;
        }
        let transport = match &slot.transport {
            Some(transport) => transport.clone(),
            None => {
                let transport = Arc::new(self.build()?);
                slot.transport = Some(transport.clone());
                slot.request_count = 0;
                transport
            }
        };
        slot.request_count += 1;
        Ok(transport)
    }

    fn build(&self) -> Result<T, TransportError> {
        (self.factory)().map_err(|e| {
            tracing::error!("unable to build transport: {e:#}");
            TransportError::new(format!("{e:#}"))
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Transport for ClientPool<T> {
    fn post(&self, call: &SoapCall) -> Result<HttpResponse, TransportError> {
        self.acquire()?.post(call)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::wire::{Port, DEFAULT_SERVICE_URL_PREFIX};

    struct Numbered(usize);

    impl Transport for Numbered {
        fn post(&self, _call: &SoapCall) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(200, self.0.to_string()))
        }
    }

    fn pool(max_requests: u32) -> ClientPool<Numbered> {
        let built = AtomicUsize::new(0);
        ClientPool::new(max_requests, move || {
            Ok(Numbered(built.fetch_add(1, Ordering::SeqCst)))
        })
    }

    fn call() -> SoapCall {
        SoapCall::new(DEFAULT_SERVICE_URL_PREFIX, Port::Signature, String::new())
    }

    #[test]
    fn transport_is_recycled_after_max_requests() {
        let pool = pool(2);
        let generations: Vec<String> = (0..5).map(|_| pool.post(&call()).unwrap().body).collect();
        assert_eq!(generations, ["0", "0", "1", "1", "2"]);
        assert!(pool.should_recycle(2));
        assert!(!pool.should_recycle(1));
    }

    #[test]
    fn renew_and_close() {
        let pool = pool(100);
        assert_eq!(pool.post(&call()).unwrap().body, "0");
        pool.renew().unwrap();
        assert_eq!(pool.request_count(), 0);
        assert_eq!(pool.post(&call()).unwrap().body, "1");
        pool.close();
        assert_eq!(pool.post(&call()).unwrap().body, "2");
        assert_eq!(pool.request_count(), 1);
    }

    #[test]
    fn factory_errors_become_transport_errors() {
        let pool: ClientPool<Numbered> =
            ClientPool::new(1, || Err(anyhow::anyhow!("no client certificate")));
        let error = pool.post(&call()).unwrap_err();
        assert_eq!(error.status, None);
        assert!(error.message.contains("no client certificate"));
    }
}
