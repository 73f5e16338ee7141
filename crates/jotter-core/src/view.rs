//! What a note card may do in each view.

use crate::models::UserId;

/// Where a note is being shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewContext {
    /// The signed-in user's own list
    Owner,
    /// Opened from a shared link
    SharedLink,
    /// Browse-all listing
    Explore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub edit: bool,
    pub delete: bool,
    pub share: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardMode {
    Editable,
    ReadOnly,
}

impl ViewContext {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Owner => Capabilities {
                edit: true,
                delete: true,
                share: true,
            },
            Self::SharedLink | Self::Explore => Capabilities {
                edit: false,
                delete: false,
                share: false,
            },
        }
    }

    /// Context for a note opened from a link: the owner gets full control
    pub fn for_link(viewer: Option<&UserId>, owner: &UserId) -> Self {
        if viewer == Some(owner) {
            Self::Owner
        } else {
            Self::SharedLink
        }
    }

    pub const fn card_mode(self) -> CardMode {
        self.capabilities().card_mode()
    }
}

impl Capabilities {
    pub const fn card_mode(self) -> CardMode {
        if self.edit || self.delete {
            CardMode::Editable
        } else {
            CardMode::ReadOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_owner_can_mutate() {
        let owner = ViewContext::Owner.capabilities();
        assert!(owner.edit && owner.delete && owner.share);
        assert_eq!(ViewContext::Owner.card_mode(), CardMode::Editable);

        for context in [ViewContext::SharedLink, ViewContext::Explore] {
            assert_eq!(context.capabilities(), Capabilities::default());
            assert_eq!(context.card_mode(), CardMode::ReadOnly);
        }
    }

    #[test]
    fn link_context_depends_on_viewer() {
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();

        assert_eq!(ViewContext::for_link(Some(&alice), &alice), ViewContext::Owner);
        assert_eq!(
            ViewContext::for_link(Some(&bob), &alice),
            ViewContext::SharedLink
        );
        assert_eq!(ViewContext::for_link(None, &alice), ViewContext::SharedLink);
    }
}
