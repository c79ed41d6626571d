pub mod mock_upstream;
pub mod relay_app;
