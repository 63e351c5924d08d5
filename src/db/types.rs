use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};

keyed_enum! {
    /// Textual details of the organisation running this site.
    #[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
    #[DieselType = "Org_detail_kind"]
    #[serde(rename_all = "snake_case")]
    pub enum OrgDetailKind {
        OrgName = "org_name", "Name";
        OrgDescription = "org_description", "Motto";
        OrgThemeColor = "org_theme_color", "Theme Color";
        OrgUrl = "org_url", "Website URL";
        /// Only visible to superusers.
        OrgAuthor = "org_author", "Author's Name";
        /// Only visible to superusers.
        OrgAuthorUrl = "org_author_url", "Author's Website URL";
    }
}

keyed_enum! {
    /// Images identifying the organisation.
    #[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
    #[DieselType = "Org_image_kind"]
    #[serde(rename_all = "snake_case")]
    pub enum OrgImageKind {
        OrgLogo = "org_logo", "Logo";
        OrgFavicon = "org_favicon", "Favicon";
        OrgAppleTouchIcon = "org_apple_touch_icon", "Apple Touch Icon";
        OrgCoverImage = "org_cover_image", "Cover Image";
    }
}

keyed_enum! {
    #[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
    #[DieselType = "Social_platform"]
    #[serde(rename_all = "snake_case")]
    pub enum SocialPlatform {
        Facebook = "facebook", "Facebook";
        Twitter = "twitter", "X (formerly Twitter)";
        Instagram = "instagram", "Instagram";
        Linkedin = "linkedin", "LinkedIn";
        Youtube = "youtube", "YouTube";
        Tiktok = "tiktok", "TikTok";
        Pinterest = "pinterest", "Pinterest";
        Snapchat = "snapchat", "Snapchat";
        Discord = "discord", "Discord";
        Telegram = "telegram", "Telegram";
        Github = "github", "GitHub";
        Reddit = "reddit", "Reddit";
        Twitch = "twitch", "Twitch";
    }
}

impl OrgDetailKind {
    /// Position of this kind in listings, starting at 1.
    pub fn ordering(self) -> usize {
        OrgDetailKind::ALL.iter()
            .position(|&kind| kind == self)
            .map_or(999, |inx| inx + 1)
    }

    /// Can only superusers see and change this detail?
    pub fn is_superuser_only(self) -> bool {
        match self {
            OrgDetailKind::OrgAuthor | OrgDetailKind::OrgAuthorUrl => true,
            _ => false,
        }
    }
}

impl OrgImageKind {
    /// Position of this kind in listings, starting at 1.
    pub fn ordering(self) -> usize {
        OrgImageKind::ALL.iter()
            .position(|&kind| kind == self)
            .map_or(999, |inx| inx + 1)
    }
}

impl SocialPlatform {
    /// Bootstrap Icons class for this platform.
    pub fn icon(self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "bi bi-twitter-x",
            SocialPlatform::Facebook => "bi bi-facebook",
            SocialPlatform::Instagram => "bi bi-instagram",
            SocialPlatform::Linkedin => "bi bi-linkedin",
            SocialPlatform::Youtube => "bi bi-youtube",
            SocialPlatform::Tiktok => "bi bi-tiktok",
            SocialPlatform::Pinterest => "bi bi-pinterest",
            SocialPlatform::Snapchat => "bi bi-snapchat",
            SocialPlatform::Discord => "bi bi-discord",
            SocialPlatform::Telegram => "bi bi-telegram",
            SocialPlatform::Github => "bi bi-github",
            SocialPlatform::Reddit => "bi bi-reddit",
            SocialPlatform::Twitch => "bi bi-twitch",
        }
    }
}
