//! Registry of recognized resource type tags.
//!
//! Each tag names one Azure Resource Manager type and the lookup keys needed
//! to pin down a single instance of it.

use std::fmt;

/// How a resource is addressed inside a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The resource group itself, addressed by `name`.
    Group,
    /// A resource inside a group, addressed by `resource_group` + `name`.
    GroupMember,
}

/// A recognized resource type.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceType {
    /// Tag used in profiles, e.g. `azurerm_network_watcher`
    pub tag: &'static str,
    /// ARM type string, e.g. `Microsoft.Network/networkWatchers`
    pub arm_type: &'static str,
    pub scope: Scope,
    /// Keys that must be present and non-empty
    pub required_keys: &'static [&'static str],
    /// Human-readable name shown by `list`
    pub description: &'static str,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

const GROUP_MEMBER_KEYS: &[&str] = &["resource_group", "name"];

/// All resource types the resolver accepts.
pub const RESOURCE_TYPES: &[ResourceType] = &[
    ResourceType {
        tag: "azurerm_network_watcher",
        arm_type: "Microsoft.Network/networkWatchers",
        scope: Scope::GroupMember,
        required_keys: GROUP_MEMBER_KEYS,
        description: "Network Watcher instance",
    },
    ResourceType {
        tag: "azurerm_resource_group",
        arm_type: "Microsoft.Resources/resourceGroups",
        scope: Scope::Group,
        required_keys: &["name"],
        description: "Resource group",
    },
    ResourceType {
        tag: "azurerm_virtual_network",
        arm_type: "Microsoft.Network/virtualNetworks",
        scope: Scope::GroupMember,
        required_keys: GROUP_MEMBER_KEYS,
        description: "Virtual network",
    },
    ResourceType {
        tag: "azurerm_network_security_group",
        arm_type: "Microsoft.Network/networkSecurityGroups",
        scope: Scope::GroupMember,
        required_keys: GROUP_MEMBER_KEYS,
        description: "Network security group",
    },
    ResourceType {
        tag: "azurerm_storage_account",
        arm_type: "Microsoft.Storage/storageAccounts",
        scope: Scope::GroupMember,
        required_keys: GROUP_MEMBER_KEYS,
        description: "Storage account",
    },
    ResourceType {
        tag: "azurerm_key_vault",
        arm_type: "Microsoft.KeyVault/vaults",
        scope: Scope::GroupMember,
        required_keys: GROUP_MEMBER_KEYS,
        description: "Key vault",
    },
];

/// Look up a resource type by its tag.
pub fn lookup(tag: &str) -> Option<&'static ResourceType> {
    RESOURCE_TYPES.iter().find(|t| t.tag == tag)
}
