use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use payment_reconciler::{
    events::{EventHandlers, EventHooks},
    ReconciliationApi,
};

use crate::support::*;

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn hooks_fire_once_per_state_change() {
    let confirmed = HookCalled::default();
    let buffered = HookCalled::default();
    let mut hooks = EventHooks::default();
    let c = confirmed.clone();
    hooks.on_order_confirmed(move |ev| {
        info!("🪝️ Order {} confirmed", ev.order.order_number);
        c.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let b = buffered.clone();
    hooks.on_confirmation_buffered(move |ev| {
        info!("🪝️ {} buffered: {}", ev.pending.transaction_ref, ev.reason);
        b.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let db = setup().await;
    let api = ReconciliationApi::new(db.clone(), producers);
    create_order(&db, "ord_0001", "ORD20240001", 1_000).await;
    let event = charge_event("chrg_1", 1_000, Some("ORD20240001"), None);
    api.reconcile(&event).await.unwrap();
    api.reconcile(&event).await.unwrap();
    api.reconcile(&charge_event("chrg_2", 1_000, Some("pending"), None)).await.unwrap();
    api.reconcile(&charge_event("chrg_2", 1_000, Some("pending"), None)).await.unwrap();

    // Handlers run on their own tasks
    for _ in 0..50 {
        if confirmed.count() == 1 && buffered.count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(confirmed.count(), 1);
    assert_eq!(buffered.count(), 2);
    drop(api);
    tear_down(db).await;
}
