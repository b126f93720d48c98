/// Profile names accepted by the bytecode parsers.
pub const SUPPORTED_PROFILES: &[&str] = &[
    "d3d", "bytecode", "glsl", "glsl120", "arb1", "nv2", "nv3", "nv4",
];

pub fn is_supported(profile: &str) -> bool {
    SUPPORTED_PROFILES.contains(&profile)
}

pub fn unsupported_message(profile: &str) -> String {
    format!("Profile '{profile}' is unknown or unsupported")
}
