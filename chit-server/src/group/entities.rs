use crate::kernel::entities::{
    GroupId,
    UserId,
};

#[derive(Clone, Debug)]
pub struct Group {
    pub id:              GroupId,
    pub name:            String,
    pub state:           Option<String>,
    pub city:            Option<String>,
    pub current_members: i32,
}

/// Role facts for one (group, user) pair, computed fresh per request so role changes
/// take effect immediately.
#[derive(Clone, Debug)]
pub struct GroupAccess {
    pub group:              Group,
    pub organizer_id:       Option<UserId>,
    pub is_organizer:       bool,
    pub is_approved_member: bool,
}

impl GroupAccess {
    pub fn can_access_auctions(&self) -> bool {
        self.is_organizer || self.is_approved_member
    }
}
