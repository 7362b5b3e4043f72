//! Message injectors — prepend context to an input before the model sees it.
//!
//! Injectors run in chain order, each receiving the previous one's output.
//! They rewrite content only; the message identity is preserved through
//! [`Message::replace_content`].

use actloop_core::message::{ContentBlock, Message};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait Injector: Send + Sync {
    fn name(&self) -> &str;

    /// Return the (possibly rewritten) message.
    fn inject(&self, message: Message) -> Message;
}

/// Prepends a fixed text block to every input while enabled.
pub struct ContextInjector {
    name: String,
    text: String,
    enabled: AtomicBool,
}

impl ContextInjector {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Injector for ContextInjector {
    fn name(&self) -> &str {
        &self.name
    }

    fn inject(&self, mut message: Message) -> Message {
        if !self.is_enabled() || self.text.is_empty() {
            return message;
        }
        let mut content = Vec::with_capacity(message.content().len() + 1);
        content.push(ContentBlock::text(self.text.clone()));
        content.extend(message.content().iter().cloned());
        message.replace_content(content);
        message
    }
}

/// An ordered sequence of injectors.
#[derive(Clone, Default)]
pub struct InjectorChain {
    injectors: Vec<Arc<dyn Injector>>,
}

impl InjectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an injector to the end of the chain.
    pub fn add(&mut self, injector: Arc<dyn Injector>) -> &mut Self {
        self.injectors.push(injector);
        self
    }

    /// Insert at `index`; out-of-range indices append.
    pub fn insert(&mut self, index: usize, injector: Arc<dyn Injector>) -> &mut Self {
        if index >= self.injectors.len() {
            self.injectors.push(injector);
        } else {
            self.injectors.insert(index, injector);
        }
        self
    }

    /// Remove every injector with the given name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.injectors.len();
        self.injectors.retain(|i| i.name() != name);
        before - self.injectors.len()
    }

    pub fn clear(&mut self) {
        self.injectors.clear();
    }

    pub fn len(&self) -> usize {
        self.injectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.injectors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.injectors.iter().map(|i| i.name()).collect()
    }

    /// Run every injector in order.
    pub fn apply_all(&self, message: Message) -> Message {
        self.injectors
            .iter()
            .fold(message, |message, injector| injector.inject(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injectors_prepend_in_chain_order() {
        let mut chain = InjectorChain::new();
        chain
            .add(Arc::new(ContextInjector::new("rules", "Follow the rules.")))
            .add(Arc::new(ContextInjector::new("tasks", "# Task Progress")));

        let input = Message::user("do it");
        let id = input.id().to_string();
        let out = chain.apply_all(input);

        // The last injector's block ends up first
        assert_eq!(out.text_content(), "# Task Progress\nFollow the rules.\ndo it");
        assert_eq!(out.id(), id);
    }

    #[test]
    fn insert_and_remove_by_name() {
        let mut chain = InjectorChain::new();
        chain.add(Arc::new(ContextInjector::new("a", "A")));
        chain.insert(0, Arc::new(ContextInjector::new("b", "B")));
        chain.insert(99, Arc::new(ContextInjector::new("c", "C")));
        assert_eq!(chain.names(), vec!["b", "a", "c"]);

        assert_eq!(chain.remove("a"), 1);
        assert_eq!(chain.remove("missing"), 0);
        assert_eq!(chain.len(), 2);

        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn disabled_injector_passes_through() {
        let injector = ContextInjector::new("ctx", "extra");
        injector.disable();
        let out = injector.inject(Message::user("plain"));
        assert_eq!(out.text_content(), "plain");

        injector.enable();
        let out = injector.inject(Message::user("plain"));
        assert_eq!(out.content().len(), 2);
    }
}
