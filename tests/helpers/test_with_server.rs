#[macro_export]
macro_rules! test_with_server {
    ($name:ident, |$server:ident, $ctx_state:ident, $config:ident| $body:block) => {
        #[tokio::test(flavor = "multi_thread")]
        #[serial_test::serial]
        async fn $name() {
            use std::sync::Arc;

            use axum_test::TestServer;
            use vidshare_server::config::AppConfig;
            use vidshare_server::database::memory_store::MemoryStore;
            use vidshare_server::middleware::mw_ctx::create_ctx_state;

            let uploads = tempfile::tempdir().expect("temp uploads dir");

            #[allow(unused_variables)]
            let $config = AppConfig {
                db_namespace: "test".to_string(),
                db_database: "test".to_string(),
                db_password: None,
                db_username: None,
                db_url: "memory".to_string(),
                jwt_secret: "secret".to_string(),
                uploads_dir: uploads.path().to_string_lossy().to_string(),
                uploads_base_url: "/uploads".to_string(),
                upload_file_size_max_mb: 100,
                max_page_size: 50,
                db_operation_timeout_ms: 5000,
                port: 0,
            };

            #[allow(unused_variables)]
            let $ctx_state = create_ctx_state(Arc::new(MemoryStore::new()), &$config);
            let routes_all = vidshare_server::init::main_router(&$ctx_state);

            #[allow(unused_variables)]
            let $server = TestServer::new(routes_all).expect("Failed to create test server");

            $body
        }
    };
}
