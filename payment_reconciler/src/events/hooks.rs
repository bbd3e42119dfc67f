use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{ConfirmationBufferedEvent, EventHandler, EventProducer, Handler, OrderConfirmedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_confirmed_producer: Vec<EventProducer<OrderConfirmedEvent>>,
    pub confirmation_buffered_producer: Vec<EventProducer<ConfirmationBufferedEvent>>,
}

pub struct EventHandlers {
    pub on_order_confirmed: Option<EventHandler<OrderConfirmedEvent>>,
    pub on_confirmation_buffered: Option<EventHandler<ConfirmationBufferedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_confirmed = hooks.on_order_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_confirmation_buffered = hooks.on_confirmation_buffered.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_confirmed, on_confirmation_buffered }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_confirmed {
            result.order_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_confirmation_buffered {
            result.confirmation_buffered_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_confirmation_buffered {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_confirmed: Option<Handler<OrderConfirmedEvent>>,
    pub on_confirmation_buffered: Option<Handler<ConfirmationBufferedEvent>>,
}

impl EventHooks {
    pub fn on_order_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_confirmation_buffered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ConfirmationBufferedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_confirmation_buffered = Some(Arc::new(f));
        self
    }
}
