mod router_test;
mod schema_test;
mod support;
mod upsert_test;
