//! Shared configuration fixture for behaviour tests.

use std::collections::BTreeMap;

use liftoff::DeployConfig;

pub const APP_NAME: &str = "orbit";
pub const REGION: &str = "eu-central-1";
pub const ENVIRONMENT: &str = "staging";

pub fn test_config() -> DeployConfig {
    DeployConfig {
        name: String::from(APP_NAME),
        description: String::from("Test deployment"),
        region: String::from(REGION),
        environment: String::from(ENVIRONMENT),
        port: 3000,
        variables: BTreeMap::new(),
    }
}

/// Writes a small workspace with a nested source tree and a `server` stub.
#[allow(dead_code, reason = "not every behaviour test packages a workspace")]
pub fn seed_workspace(root: &std::path::Path) {
    std::fs::write(root.join("server"), b"#!/bin/sh\nexec ./app\n").expect("server stub");
    std::fs::create_dir_all(root.join("static/css")).expect("nested dirs");
    std::fs::write(root.join("static/index.html"), b"<html></html>").expect("index");
    std::fs::write(root.join("static/css/site.css"), b"body {}").expect("css");
}
