//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a few lines MUST go into a separate module.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Database and payment processor calls are all asynchronous, so keep
//! it that way.
//!
//! A note about webhooks:
//! Omise retries a webhook until it gets a 2xx answer. Anything the server has dealt with, including events it chose to
//! ignore and processor lookups that failed, is answered with 200. Only malformed payloads (400), orders that cannot be
//! found and cannot be buffered (404), and database failures (500) are rejected, so that the last of these is retried.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use payment_reconciler::{ChargeProvider, ReconciliationApi, ReconciliationDatabase, WebhookApi};

use crate::{
    config::SweepConfig,
    data_objects::{JsonResponse, LinkPendingParams, PaymentStatusParams, PaymentStatusResponse, PendingListParams},
    errors::ServerError,
};

const DEFAULT_PENDING_LIST_LIMIT: usize = 100;
const MAX_PENDING_LIST_LIMIT: usize = 1000;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(omise_webhook => Post "/omise" impl ReconciliationDatabase, ChargeProvider);
pub async fn omise_webhook<B, C>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    C: ChargeProvider,
{
    trace!("💻️ Received Omise webhook ({} bytes) from {:?}", body.len(), req.peer_addr());
    let outcome = api.handle_webhook(&body).await.map_err(|e| {
        warn!("💻️ Rejecting Omise webhook. {e}");
        ServerError::from(e)
    })?;
    debug!("💻️ Omise webhook handled. {}", outcome.message());
    Ok(HttpResponse::Ok().json(JsonResponse::success(outcome.message())))
}

//----------------------------------------------   Status  ----------------------------------------------------
route!(payment_status => Get "/api/payment_status" impl ReconciliationDatabase, ChargeProvider);
pub async fn payment_status<B, C>(
    query: web::Query<PaymentStatusParams>,
    api: web::Data<WebhookApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    C: ChargeProvider,
{
    let status = if let Some(reference) = query.reference() {
        trace!("💻️ Payment status query for reference {reference}");
        api.status_by_reference(reference).await?
    } else if let Some(order_id) = query.order_id() {
        trace!("💻️ Payment status query for order {order_id}");
        api.engine()
            .status_by_order_id(&order_id)
            .await?
            .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?
    } else {
        return Err(ServerError::InvalidRequestQuery("Supply either 'reference' or 'order_id'".to_string()));
    };
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(status)))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(pending_confirmations => Get "/pending" impl ReconciliationDatabase);
pub async fn pending_confirmations<B: ReconciliationDatabase>(
    params: web::Query<PendingListParams>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let limit = params.limit.unwrap_or(DEFAULT_PENDING_LIST_LIMIT).min(MAX_PENDING_LIST_LIMIT);
    let pending = api.unprocessed_pending(limit).await?;
    debug!("💻️ {} unprocessed pending confirmations", pending.len());
    Ok(HttpResponse::Ok().json(pending))
}

route!(link_pending => Post "/pending/{reference}/link" impl ReconciliationDatabase);
pub async fn link_pending<B: ReconciliationDatabase>(
    path: web::Path<String>,
    body: web::Json<LinkPendingParams>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let reference = path.into_inner();
    let LinkPendingParams { order_id } = body.into_inner();
    info!("💻️ Manual link of buffered payment {reference} to order {order_id} requested");
    let confirmed = api.link_pending(&reference, &order_id).await?;
    Ok(HttpResponse::Ok().json(confirmed))
}

route!(run_sweep => Post "/sweep" impl ReconciliationDatabase);
pub async fn run_sweep<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    settings: web::Data<SweepConfig>,
) -> Result<HttpResponse, ServerError> {
    let result = api.sweep_pending(settings.batch_size).await?;
    info!("💻️ On-demand sweep complete: {result}");
    Ok(HttpResponse::Ok().json(result))
}
