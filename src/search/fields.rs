//! Field registry / 字段注册表
//!
//! Every field the query language can address is listed here. Field names
//! coming from a query are resolved through the alias table first and then
//! matched against the canonical dotted paths; anything else is rejected.
//! 查询中的字段名先经过别名表，再匹配规范路径，未知字段直接拒绝。

use crate::models::IndexSortKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Free text, fans out over the default text fields / 默认全文字段
    Default,
    Invite,
    InviterUsername,
    InviterGlobalName,
    InviterId,
    GuildId,
    GuildName,
    GuildDescription,
    GuildIcon,
    GuildFeatures,
    GuildVanityUrlCode,
    GuildNsfw,
    GuildPremiumTier,
    GuildVerificationLevel,
    GuildPremiumSubscriptionCount,
    ChannelId,
    ChannelName,
    ProfileTag,
    ProfileTraits,
    MemberCount,
    OnlineCount,
}

/// Fields searched by free text / 全文搜索覆盖的字段
pub const DEFAULT_TEXT_FIELDS: [Field; 4] = [
    Field::GuildName,
    Field::GuildDescription,
    Field::ProfileTag,
    Field::ProfileTraits,
];

/// Short names accepted in `field:value` terms / 查询别名
const FIELD_ALIASES: &[(&str, Field)] = &[
    ("members", Field::MemberCount),
    ("online", Field::OnlineCount),
    ("boosts", Field::GuildPremiumSubscriptionCount),
    ("tier", Field::GuildPremiumTier),
    ("nsfw", Field::GuildNsfw),
    ("verification", Field::GuildVerificationLevel),
    ("feature", Field::GuildFeatures),
    ("global_name", Field::InviterGlobalName),
    ("tag", Field::ProfileTag),
    ("trait", Field::ProfileTraits),
];

impl Field {
    pub const ALL: [Field; 21] = [
        Field::Default,
        Field::Invite,
        Field::InviterUsername,
        Field::InviterGlobalName,
        Field::InviterId,
        Field::GuildId,
        Field::GuildName,
        Field::GuildDescription,
        Field::GuildIcon,
        Field::GuildFeatures,
        Field::GuildVanityUrlCode,
        Field::GuildNsfw,
        Field::GuildPremiumTier,
        Field::GuildVerificationLevel,
        Field::GuildPremiumSubscriptionCount,
        Field::ChannelId,
        Field::ChannelName,
        Field::ProfileTag,
        Field::ProfileTraits,
        Field::MemberCount,
        Field::OnlineCount,
    ];

    /// Canonical dotted path inside a document's `data` / 文档中的规范路径
    pub fn path(self) -> &'static str {
        match self {
            Field::Default => "default",
            Field::Invite => "invite",
            Field::InviterUsername => "inviter.username",
            Field::InviterGlobalName => "inviter.global_name",
            Field::InviterId => "inviter.id",
            Field::GuildId => "guild.id",
            Field::GuildName => "guild.name",
            Field::GuildDescription => "guild.description",
            Field::GuildIcon => "guild.icon",
            Field::GuildFeatures => "guild.features",
            Field::GuildVanityUrlCode => "guild.vanity_url_code",
            Field::GuildNsfw => "guild.nsfw",
            Field::GuildPremiumTier => "guild.premium_tier",
            Field::GuildVerificationLevel => "guild.verification_level",
            Field::GuildPremiumSubscriptionCount => "guild.premium_subscription_count",
            Field::ChannelId => "channel.id",
            Field::ChannelName => "channel.name",
            Field::ProfileTag => "profile.tag",
            Field::ProfileTraits => "profile.traits",
            Field::MemberCount => "profile.member_count",
            Field::OnlineCount => "profile.online_count",
        }
    }

    /// Match a canonical path / 按规范路径查找
    pub fn from_path(path: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.path() == path)
    }

    /// Resolve a user-supplied field name (alias first, then path) / 解析查询中的字段名
    pub fn resolve(name: &str) -> Option<Field> {
        FIELD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, field)| *field)
            .or_else(|| Field::from_path(name))
    }

    /// Directory name of this field's keyword shards / 索引目录名
    pub fn index_dir(self) -> String {
        self.path().replace('.', "_")
    }

    /// Pointer alias carrying this field, when the index carries it / 索引携带的排序字段
    pub fn index_sort_key(self) -> Option<IndexSortKey> {
        match self {
            Field::MemberCount => Some(IndexSortKey::MemberCount),
            Field::OnlineCount => Some(IndexSortKey::OnlineCount),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_alias_and_path() {
        assert_eq!(Field::resolve("members"), Some(Field::MemberCount));
        assert_eq!(Field::resolve("boosts"), Some(Field::GuildPremiumSubscriptionCount));
        assert_eq!(Field::resolve("guild.name"), Some(Field::GuildName));
        assert_eq!(Field::resolve("default"), Some(Field::Default));
        assert_eq!(Field::resolve("Members"), None);
        assert_eq!(Field::resolve("guild.owner"), None);
    }

    #[test]
    fn test_paths_are_unique() {
        for field in Field::ALL {
            assert_eq!(Field::from_path(field.path()), Some(field));
        }
    }

    #[test]
    fn test_index_dir() {
        assert_eq!(Field::MemberCount.index_dir(), "profile_member_count");
        assert_eq!(Field::Invite.index_dir(), "invite");
    }

    #[test]
    fn test_index_sort_key() {
        assert_eq!(Field::MemberCount.index_sort_key(), Some(IndexSortKey::MemberCount));
        assert_eq!(Field::OnlineCount.index_sort_key(), Some(IndexSortKey::OnlineCount));
        assert_eq!(Field::GuildName.index_sort_key(), None);
    }
}
