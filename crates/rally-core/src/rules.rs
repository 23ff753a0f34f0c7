//! Who may change what, and when.
//!
//! Every function here decides over facts that were loaded before the call and
//! returns a [`Decision`]. Handlers consult them in a fixed order:
//! authentication, payload shape, existence, ownership, then lifecycle limits.
//! Within one function the same order holds, so a missing petition is
//! reported before a foreign owner, and a foreign owner before a tier limit.

use std::collections::HashSet;

use rally_types::models::{PetitionId, SupportTierId, UserId};

use crate::error::{Decision, Denial};

pub const MIN_SUPPORT_TIERS: usize = 1;
pub const MAX_SUPPORT_TIERS: usize = 3;

/// What the rules need to know about a petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetitionFacts {
    pub id: PetitionId,
    pub owner_id: UserId,
    pub tier_count: usize,
    pub supporter_count: usize,
}

/// What the rules need to know about a support tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierFacts {
    pub id: SupportTierId,
    pub petition_id: PetitionId,
    pub supporter_count: usize,
}

const NO_PETITION: &str = "No petition found with id";
const NO_TIER: &str = "Support tier does not exist on petition";
const NO_USER: &str = "No user with specified ID";

pub fn authenticate(caller: Option<UserId>) -> Decision<UserId> {
    caller.ok_or(Denial::Unauthenticated)
}

/// A new petition must arrive with one to three tiers whose titles are
/// pairwise distinct.
pub fn check_tier_set<'a, I>(titles: I) -> Decision
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for title in titles {
        if !seen.insert(title) {
            return Err(Denial::invalid(
                "support tier titles must be unique within a petition",
            ));
        }
    }
    if seen.len() < MIN_SUPPORT_TIERS {
        return Err(Denial::invalid("a petition needs at least one support tier"));
    }
    if seen.len() > MAX_SUPPORT_TIERS {
        return Err(Denial::invalid(format!(
            "a petition may have at most {MAX_SUPPORT_TIERS} support tiers"
        )));
    }
    Ok(())
}

fn existing(petition: Option<&PetitionFacts>) -> Decision<&PetitionFacts> {
    petition.ok_or_else(|| Denial::not_found(NO_PETITION))
}

fn tier_on<'a>(petition: &PetitionFacts, tier: Option<&'a TierFacts>) -> Decision<&'a TierFacts> {
    tier.filter(|t| t.petition_id == petition.id)
        .ok_or_else(|| Denial::not_found(NO_TIER))
}

fn owned_by(petition: &PetitionFacts, caller: UserId, action: &str) -> Decision {
    if petition.owner_id != caller {
        return Err(Denial::forbidden(format!(
            "Only the owner of a petition may {action} it"
        )));
    }
    Ok(())
}

pub fn edit_petition(caller: UserId, petition: Option<&PetitionFacts>) -> Decision {
    let petition = existing(petition)?;
    owned_by(petition, caller, "change")
}

pub fn delete_petition(caller: UserId, petition: Option<&PetitionFacts>) -> Decision {
    let petition = existing(petition)?;
    owned_by(petition, caller, "delete")?;
    if petition.supporter_count > 0 {
        return Err(Denial::forbidden(
            "Can not delete a petition if one or more users have supported it",
        ));
    }
    Ok(())
}

pub fn set_petition_image(caller: UserId, petition: Option<&PetitionFacts>) -> Decision {
    let petition = existing(petition)?;
    owned_by(petition, caller, "change the image of")
}

pub fn add_support_tier(caller: UserId, petition: Option<&PetitionFacts>) -> Decision {
    let petition = existing(petition)?;
    owned_by(petition, caller, "change")?;
    if petition.tier_count >= MAX_SUPPORT_TIERS {
        return Err(Denial::forbidden(format!(
            "Can not add a support tier if {MAX_SUPPORT_TIERS} already exist"
        )));
    }
    Ok(())
}

pub fn edit_support_tier(
    caller: UserId,
    petition: Option<&PetitionFacts>,
    tier: Option<&TierFacts>,
) -> Decision {
    let petition = existing(petition)?;
    let tier = tier_on(petition, tier)?;
    owned_by(petition, caller, "change")?;
    if tier.supporter_count > 0 {
        return Err(Denial::forbidden(
            "Can not edit a support tier if a supporter already exists for it",
        ));
    }
    Ok(())
}

pub fn delete_support_tier(
    caller: UserId,
    petition: Option<&PetitionFacts>,
    tier: Option<&TierFacts>,
) -> Decision {
    let petition = existing(petition)?;
    let tier = tier_on(petition, tier)?;
    owned_by(petition, caller, "delete tiers of")?;
    if tier.supporter_count > 0 {
        return Err(Denial::forbidden(
            "Can not delete a support tier if a supporter already exists for it",
        ));
    }
    if petition.tier_count <= MIN_SUPPORT_TIERS {
        return Err(Denial::forbidden(
            "Can not remove a support tier if it is the only one for a petition",
        ));
    }
    Ok(())
}

/// Pledging to someone else's petition at one of its tiers. A second pledge
/// to the same tier is refused by the store's uniqueness index and comes
/// back as [`Denial::Conflict`].
pub fn create_supporter(
    caller: UserId,
    petition: Option<&PetitionFacts>,
    tier: Option<&TierFacts>,
) -> Decision {
    let petition = existing(petition)?;
    tier_on(petition, tier)?;
    if petition.owner_id == caller {
        return Err(Denial::forbidden("Cannot support your own petition"));
    }
    Ok(())
}

/// `target` is the id of the loaded user, `None` when no such user exists.
pub fn edit_user(caller: UserId, target: Option<UserId>) -> Decision {
    let target = target.ok_or_else(|| Denial::not_found(NO_USER))?;
    if target != caller {
        return Err(Denial::forbidden("Can not edit another user's information"));
    }
    Ok(())
}

pub fn edit_user_image(caller: UserId, target: Option<UserId>) -> Decision {
    let target = target.ok_or_else(|| Denial::not_found(NO_USER))?;
    if target != caller {
        return Err(Denial::forbidden("Can not change another user's profile image"));
    }
    Ok(())
}

/// `current_matches` is the verdict of checking `current` against the stored
/// hash.
pub fn change_password(current_matches: bool, current: &str, new: &str) -> Decision {
    if !current_matches {
        return Err(Denial::InvalidCredentials("Invalid currentPassword".into()));
    }
    if current == new {
        return Err(Denial::forbidden("Identical current and new passwords"));
    }
    Ok(())
}
