//! Test fixtures and constants.

/// A valid age public key with no known identity.
pub const STRANGER_PUBLIC_KEY: &str = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

/// A Secret with a base64 `data` payload (`user` / `s3cr3t-pass`).
pub const DATA_SECRET: &str = r#"apiVersion: v1
kind: Secret
metadata:
  namespace: ns1
  name: db
type: Opaque
data:
  user: YWRtaW4=
  password: czNjcjN0LXBhc3M=
"#;

/// A Secret with a literal `stringData` payload and no namespace.
pub const STRING_DATA_SECRET: &str = r#"apiVersion: v1
kind: Secret
metadata:
  name: api
stringData:
  token: sk-test-12345
"#;

/// A non-Secret manifest.
pub const CONFIG_MAP: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: fast
"#;

/// A Deployment and a Secret in one stream.
pub const MIXED_STREAM: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
---
apiVersion: v1
kind: Secret
metadata:
  namespace: web
  name: web-env
stringData:
  DATABASE_URL: postgres://localhost/mydb
"#;

/// A Secret with both payload fields.
pub const CONFLICTING_SECRET: &str = r#"kind: Secret
metadata:
  name: both
data:
  a: Yg==
stringData:
  c: d
"#;

/// A Secret with a payload that is not base64.
pub const BAD_BASE64_SECRET: &str = r#"kind: Secret
metadata:
  name: broken
data:
  key: "not base64!!"
"#;
