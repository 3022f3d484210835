use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub fn future_expiry() -> String {
    (OffsetDateTime::now_utc() + Duration::days(1))
        .format(&Rfc3339)
        .unwrap()
}

pub fn past_expiry() -> String {
    (OffsetDateTime::now_utc() - Duration::days(1))
        .format(&Rfc3339)
        .unwrap()
}

/// One line of the `windows-keys` attribute as the metadata server sends it.
pub fn key_line(user_name: &str, expire_on: &str) -> String {
    serde_json::json!({
        "email": format!("{user_name}@example.com"),
        "expireOn": expire_on,
        "exponent": "AQAB",
        "modulus": "xyz",
        "userName": user_name,
        "hashFunction": "sha256",
    })
    .to_string()
}

/// A recursive metadata response with one usable key on the instance.
pub fn sample_metadata() -> serde_json::Value {
    serde_json::json!({
        "instance": {
            "attributes": {
                "enable-diagnostics": "true",
                "windows-keys": key_line("bob", &future_expiry()),
            },
            "hostname": "win-1.c.my-project.internal",
            "networkInterfaces": [
                {
                    "mac": "42:01:0a:80:00:02",
                    "forwardedIps": ["10.1.2.3"],
                    "targetInstanceIps": [],
                    "ip": "10.128.0.2",
                }
            ],
        },
        "project": {
            "attributes": {
                "disable-account-manager": "false",
            },
            "projectId": "my-project",
            "numericProjectId": 1234,
        },
    })
}
