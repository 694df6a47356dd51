use super::ResponseSlots;
use crate::model::Request;
use std::sync::Arc;

/// An expected request and the responses declared for it.
#[derive(Debug, Clone)]
pub struct Expectation<R> {
    request: Arc<Request>,
    slots: ResponseSlots<R>,
}

impl<R> Expectation<R> {
    pub fn new(request: Request) -> Self {
        Self {
            request: Arc::new(request),
            slots: ResponseSlots::new(),
        }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn slots(&self) -> &ResponseSlots<R> {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut ResponseSlots<R> {
        &mut self.slots
    }

    /// One copy of the request per unconsumed slot.
    pub fn missing(&self) -> impl Iterator<Item = Request> + '_ {
        self.slots
            .unconsumed()
            .iter()
            .map(|_| self.request.as_ref().clone())
    }
}
