//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the engine backend so that the endpoint tests can run them against mocks. Any I/O must be
//! awaited, never blocking, since each worker thread processes its requests sequentially.
use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
};

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use billing_engine::{
    db_types::OrderId,
    order_objects::OrderCreateRequest,
    payment_system::{CreatePaymentStatus, PaymentNotification},
    project_objects::ProjectUpdate,
    traits::{BillingBackend, CatalogManagement},
    OrderManagerApi,
    OrderManagerError,
    ProjectApi,
};
use log::*;
use serde_json::{Map, Value};

use crate::{
    config::ServerOptions,
    data_objects::{list_orders_request, revenue_request, NotificationResponse},
    errors::ServerError,
    helpers::{flatten_json_params, get_remote_ip},
};

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

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
async fn new_order<B: BillingBackend>(
    req: &HttpRequest,
    params: BTreeMap<String, String>,
    is_json_request: bool,
    api: &OrderManagerApi<B>,
    options: &ServerOptions,
) -> Result<HttpResponse, ServerError> {
    let request = OrderCreateRequest::from_params(params, is_json_request)
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
        .with_ip(get_remote_ip(req, options.use_x_forwarded_for, options.use_forwarded));
    debug!("💻️ New order request for project {}", request.project);
    let order = api.process_new_order(request).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(create_order => Post "/order" impl BillingBackend);
/// Creates an order from a JSON object of scalar values. Non-scalar values are ignored.
pub async fn create_order<B: BillingBackend>(
    req: HttpRequest,
    body: web::Json<Map<String, Value>>,
    api: web::Data<OrderManagerApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received JSON order request");
    let params = flatten_json_params(body.into_inner());
    new_order(&req, params, true, api.get_ref(), options.get_ref()).await
}

route!(create_order_form => Post "/order/form" impl BillingBackend);
pub async fn create_order_form<B: BillingBackend>(
    req: HttpRequest,
    body: web::Form<BTreeMap<String, String>>,
    api: web::Data<OrderManagerApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received form order request");
    new_order(&req, body.into_inner(), false, api.get_ref(), options.get_ref()).await
}

route!(order_by_id => Get "/order/{id}" impl BillingBackend);
/// The order with what the payer would pay through each of the project's payment methods.
pub async fn order_by_id<B: BillingBackend>(
    path: web::Path<String>,
    api: web::Data<OrderManagerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ Received request for order {id}");
    let id = OrderId::from_str(&id).map_err(|_| ServerError::OrderError(OrderManagerError::OrderNotFound))?;
    let order = api.order_with_payment_methods(&id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payment" impl BillingBackend);
pub async fn create_payment<B: BillingBackend>(
    body: web::Form<HashMap<String, String>>,
    api: web::Data<OrderManagerApi<B>>,
) -> impl Responder {
    trace!("💻️ Received payment form submission");
    let response = api.process_create_payment(body.into_inner()).await;
    match response.status {
        CreatePaymentStatus::Ok => HttpResponse::Ok().json(response),
        CreatePaymentStatus::ErrorValidation => HttpResponse::BadRequest().json(response),
        CreatePaymentStatus::ErrorSystem => HttpResponse::InternalServerError().json(response),
    }
}

route!(notify_payment => Post "/payment/notify" impl BillingBackend);
/// Payment system callback. A rejected payment is still a processed notification and answers 200.
pub async fn notify_payment<B: BillingBackend>(
    body: web::Json<PaymentNotification>,
    api: web::Data<OrderManagerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let notification = body.into_inner();
    debug!("💻️ Received payment notification for order {}", notification.order_id);
    let outcome = api.process_notify_payment(&notification).await?;
    Ok(HttpResponse::Ok().json(NotificationResponse::from(&outcome)))
}

//----------------------------------------------   Reports  ----------------------------------------------------
route!(orders => Get "/orders" impl BillingBackend);
pub async fn orders<B: BillingBackend>(
    query: web::Query<Vec<(String, String)>>,
    api: web::Data<OrderManagerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = list_orders_request(query.into_inner())?;
    trace!("💻️ Received order listing request for projects {:?}", request.projects);
    let page = api.find_orders(&request).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(revenue_dynamic => Get "/revenue_dynamic" impl BillingBackend);
pub async fn revenue_dynamic<B: BillingBackend>(
    query: web::Query<Vec<(String, String)>>,
    api: web::Data<OrderManagerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = revenue_request(query.into_inner())?;
    trace!("💻️ Received revenue request for projects {:?}", request.projects);
    let result = api.revenue_dynamic(&request).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Projects  ----------------------------------------------------
route!(update_project => Patch "/projects/{id}" impl CatalogManagement);
pub async fn update_project<B: CatalogManagement>(
    path: web::Path<String>,
    body: web::Json<ProjectUpdate>,
    api: web::Data<ProjectApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let project_id = path.into_inner();
    debug!("💻️ Received update for project {project_id}");
    let project = api.update_project(&project_id, &body).await?;
    Ok(HttpResponse::Ok().json(project))
}
