//! Built-in profiles, compiled into the binary.

use super::Profile;
use crate::control::{Control, Expectation};
use crate::guard::Guard;
use crate::resource::ResourceDescriptor;
use crate::VerifyError;

/// Name accepted by `--profile` for the bundled network watcher profile.
pub const NETWORK_WATCHER: &str = "builtin:azurerm_network_watcher";

const NETWORK_WATCHER_TOML: &str = include_str!("../../profiles/azurerm_network_watcher.toml");

/// Environment flag gating the network watcher control.
pub const NETWORK_WATCHER_FLAG: &str = "NETWORK_WATCHER";

/// Names of all built-in profiles.
pub fn names() -> &'static [&'static str] {
    &[NETWORK_WATCHER]
}

/// Load a built-in profile by name.
pub fn load(name: &str) -> Option<Result<Profile, VerifyError>> {
    match name {
        NETWORK_WATCHER => Some(Profile::from_toml(NETWORK_WATCHER_TOML, NETWORK_WATCHER)),
        _ => None,
    }
}

/// The network watcher control, built directly.
///
/// Same checks as the bundled profile: the watcher exists with the given id
/// and name, has the network watcher ARM type and finished provisioning,
/// while a bogus watcher name and a bogus resource group do not exist.
pub fn network_watcher_control(resource_group: &str, name: &str, id: &str) -> Control {
    let watcher = |group: &str, name: &str| {
        ResourceDescriptor::new("azurerm_network_watcher")
            .key("resource_group", group)
            .key("name", name)
    };

    Control::new("azurerm_network_watcher")
        .title("Network Watcher exists and is provisioned")
        .impact(1.0)
        .only_if(Guard::EnvSet(NETWORK_WATCHER_FLAG.to_string()))
        .describe(
            watcher(resource_group, name),
            vec![
                Expectation::exists(),
                Expectation::its("id").equals(id),
                Expectation::its("name").equals(name),
                Expectation::its("type").equals("Microsoft.Network/networkWatchers"),
                Expectation::its("provisioning_state").equals("Succeeded"),
            ],
        )
        .describe(watcher(resource_group, "fake"), vec![Expectation::not_exists()])
        .describe(watcher("does-not-exist", name), vec![Expectation::not_exists()])
}
