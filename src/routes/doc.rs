use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::CartList,
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payments::{
            GatewayReturnResult, PaymentList, RefundPaymentRequest, RefundResult,
            UpdatePaymentStatusRequest,
        },
        products,
        promotions::{ValidatePromotionRequest, ValidatePromotionResponse},
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    },
    models::{CartItem, Order, OrderItem, Payment, Product, Promotion, Review, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, payments, products as product_routes,
        promotions, reviews,
    },
    status::{OrderStatus, PaymentMethod, PaymentStatus},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        product_routes::list_products,
        product_routes::get_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        promotions::validate_promotion,
        reviews::create_review,
        reviews::update_review,
        reviews::list_order_reviews,
        payments::gateway_return,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_payments,
        admin::get_payment,
        admin::update_payment_status,
        admin::refund_payment
    ),
    components(
        schemas(
            User,
            Product,
            CartItem,
            Order,
            OrderItem,
            Payment,
            Promotion,
            Review,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            RefundPaymentRequest,
            RefundResult,
            GatewayReturnResult,
            ValidatePromotionRequest,
            ValidatePromotionResponse,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            CartList,
            OrderList,
            OrderWithItems,
            PaymentList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::PaymentListQuery,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentList>,
            ApiResponse<ValidatePromotionResponse>,
            ApiResponse<ReviewList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Promotions", description = "Promotion validation"),
        (name = "Reviews", description = "Per-order product reviews"),
        (name = "Payments", description = "Payment gateway return"),
        (name = "Admin", description = "Staff endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
