//! Weighted threshold evaluation over account permissions

use std::collections::HashSet;

use super::MultisigError;
use crate::core::{operations_allow, ContractType, Permission, PermissionKind, OPERATIONS_LEN};
use crate::crypto::Address;

/// Most keys a single permission may hold
pub const MAX_PERMISSION_KEYS: usize = 5;

/// Most active permissions an account may hold
pub const MAX_ACTIVE_PERMISSIONS: usize = 8;

/// Sum of the weights of the permission's keys held by `signers`.
/// Each address counts once no matter how often it appears. The sum
/// saturates at `i64::MAX`.
pub fn weight_of(permission: &Permission, signers: &[Address]) -> i64 {
    let signers: HashSet<&Address> = signers.iter().collect();
    let mut counted = HashSet::new();

    permission
        .keys
        .iter()
        .filter(|key| signers.contains(&key.address) && counted.insert(key.address))
        .fold(0i64, |acc, key| acc.saturating_add(key.weight))
}

pub fn meets_threshold(permission: &Permission, signers: &[Address]) -> bool {
    weight_of(permission, signers) >= permission.threshold
}

/// Whether `address` is one of the permission's keys
pub fn is_authorized(permission: &Permission, address: &Address) -> bool {
    permission.keys.iter().any(|key| key.address == *address)
}

/// Whether the permission may authorize a contract of this type.
/// Owner permits everything; active permissions consult their operations
/// bitmap; witness permits nothing.
pub fn permits(permission: &Permission, contract_type: ContractType) -> bool {
    match permission.kind {
        PermissionKind::Owner => true,
        PermissionKind::Witness => false,
        PermissionKind::Active => permission
            .operations
            .as_deref()
            .map(|ops| operations_allow(ops, contract_type))
            .unwrap_or(false),
    }
}

/// Check a permission against the chain's structural rules
pub fn validate_permission(permission: &Permission) -> Result<(), MultisigError> {
    let invalid = |msg: String| Err(MultisigError::Validation(msg));
    let name = if permission.name.is_empty() {
        format!("permission {}", permission.id)
    } else {
        permission.name.clone()
    };

    if permission.threshold <= 0 {
        return invalid(format!("{}: threshold must be positive", name));
    }
    if permission.keys.is_empty() {
        return invalid(format!("{}: no keys", name));
    }
    if permission.keys.len() > MAX_PERMISSION_KEYS {
        return invalid(format!(
            "{}: {} keys exceeds the limit of {}",
            name,
            permission.keys.len(),
            MAX_PERMISSION_KEYS
        ));
    }

    let mut seen = HashSet::new();
    for key in &permission.keys {
        if key.weight <= 0 {
            return invalid(format!("{}: key {} has non-positive weight", name, key.address));
        }
        if !seen.insert(key.address) {
            return invalid(format!("{}: duplicate key {}", name, key.address));
        }
    }

    let total = permission
        .keys
        .iter()
        .try_fold(0i64, |acc, key| acc.checked_add(key.weight));
    match total {
        Some(total) if total >= permission.threshold => {}
        _ => {
            return invalid(format!(
                "{}: key weights cannot reach threshold {}",
                name, permission.threshold
            ))
        }
    }

    match permission.kind {
        PermissionKind::Active => match &permission.operations {
            Some(ops) if ops.len() == OPERATIONS_LEN => {}
            _ => {
                return invalid(format!(
                    "{}: active permission needs a {}-byte operations bitmap",
                    name, OPERATIONS_LEN
                ))
            }
        },
        PermissionKind::Owner | PermissionKind::Witness => {
            if permission.operations.is_some() {
                return invalid(format!("{}: only active permissions carry operations", name));
            }
        }
    }

    if permission.kind == PermissionKind::Witness && permission.keys.len() != 1 {
        return invalid(format!("{}: witness permission takes exactly one key", name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PermissionKey;
    use crate::crypto::KeyPair;

    fn addresses(n: usize) -> Vec<Address> {
        (0..n).map(|_| KeyPair::generate().address()).collect()
    }

    fn weighted(addrs: &[Address], weights: &[i64], threshold: i64) -> Permission {
        let keys = addrs
            .iter()
            .zip(weights)
            .map(|(a, w)| PermissionKey::new(*a, *w))
            .collect();
        Permission::owner(threshold, keys)
    }

    #[test]
    fn test_weighted_threshold() {
        let abc = addresses(3);
        let (a, b, c) = (abc[0], abc[1], abc[2]);
        let permission = weighted(&abc, &[2, 3, 5], 5);

        assert!(!meets_threshold(&permission, &[a]));
        assert!(!meets_threshold(&permission, &[b]));
        assert!(meets_threshold(&permission, &[c]));
        assert!(meets_threshold(&permission, &[a, b]));
        assert_eq!(weight_of(&permission, &[a, b, c]), 10);
    }

    #[test]
    fn test_duplicate_signers_counted_once() {
        let abc = addresses(3);
        let permission = weighted(&abc, &[1, 1, 1], 2);
        assert_eq!(weight_of(&permission, &[abc[0], abc[0], abc[0]]), 1);
        assert!(!meets_threshold(&permission, &[abc[0], abc[0]]));
    }

    #[test]
    fn test_unknown_signers_carry_no_weight() {
        let abc = addresses(3);
        let permission = weighted(&abc, &[1, 1, 1], 2);
        let outsider = KeyPair::generate().address();
        assert_eq!(weight_of(&permission, &[outsider, abc[1]]), 1);
        assert!(is_authorized(&permission, &abc[1]));
        assert!(!is_authorized(&permission, &outsider));
    }

    #[test]
    fn test_hex_case_insensitive_match() {
        let a = KeyPair::generate().address();
        let upper: Address = a.to_hex().to_uppercase().parse().unwrap();
        let permission = weighted(&[a], &[1], 1);
        assert!(meets_threshold(&permission, &[upper]));
    }

    #[test]
    fn test_weight_saturates() {
        let ab = addresses(2);
        let permission = weighted(&ab, &[i64::MAX, i64::MAX], 2);
        assert_eq!(weight_of(&permission, &ab), i64::MAX);
        assert!(validate_permission(&permission).is_err());
    }

    #[test]
    fn test_permits() {
        let abc = addresses(1);
        let keys = vec![PermissionKey::new(abc[0], 1)];
        let owner = Permission::owner(1, keys.clone());
        let active = Permission::active(2, "transfers", 1, keys.clone(), &[ContractType::Transfer]);
        let witness = Permission::witness(1, keys);

        assert!(permits(&owner, ContractType::AccountPermissionUpdate));
        assert!(permits(&active, ContractType::Transfer));
        assert!(!permits(&active, ContractType::TriggerSmartContract));
        assert!(!permits(&witness, ContractType::Transfer));
    }

    #[test]
    fn test_validate_permission() {
        let abc = addresses(3);
        assert!(validate_permission(&weighted(&abc, &[1, 1, 1], 2)).is_ok());

        // threshold unreachable
        assert!(validate_permission(&weighted(&abc, &[1, 1, 1], 4)).is_err());
        // zero threshold
        assert!(validate_permission(&weighted(&abc, &[1, 1, 1], 0)).is_err());
        // non-positive weight
        assert!(validate_permission(&weighted(&abc, &[1, 0, 1], 1)).is_err());
        // duplicate address
        let dup = [abc[0], abc[0]];
        assert!(validate_permission(&weighted(&dup, &[1, 1], 1)).is_err());
        // too many keys
        let six = addresses(6);
        assert!(validate_permission(&weighted(&six, &[1; 6], 1)).is_err());
    }

    #[test]
    fn test_validate_active_operations() {
        let keys = vec![PermissionKey::new(KeyPair::generate().address(), 1)];
        let mut active = Permission::active(2, "active", 1, keys, &[ContractType::Transfer]);
        assert!(validate_permission(&active).is_ok());

        active.operations = None;
        assert!(validate_permission(&active).is_err());
    }
}
