pub mod quota_routes;
