use serde::{Deserialize, Serialize};

use super::{CampaignId, GroupId, LeadCampaignStatus, LeadStatus};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Name,
    Status,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Status => "status",
            SortField::CreatedAt => "createdAt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" => Some(SortField::Name),
            "status" => Some(SortField::Status),
            "createdat" | "created_at" | "created-at" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("cannot sort by '{}' (name, status, createdAt)", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("unknown order '{}' (asc, desc)", s)),
        }
    }
}

/// Query-layer filter for leads. Every set field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    /// Case-insensitive substring of the lead name.
    pub name: Option<String>,
    pub status: Option<LeadStatus>,
    pub group_id: Option<GroupId>,
    pub campaign_id: Option<CampaignId>,
    /// Status inside `campaign_id`; ignored without a campaign.
    pub campaign_status: Option<LeadCampaignStatus>,
}

/// Which relations to load alongside each lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeadInclude {
    pub groups: bool,
    pub campaigns: bool,
}

impl LeadInclude {
    pub fn all() -> Self {
        Self {
            groups: true,
            campaigns: true,
        }
    }

    pub fn groups() -> Self {
        Self {
            groups: true,
            campaigns: false,
        }
    }

    pub fn campaigns() -> Self {
        Self {
            groups: false,
            campaigns: true,
        }
    }
}

/// Everything a repository needs to produce one page of leads.
#[derive(Debug, Clone, Default)]
pub struct FindLeads {
    pub filter: LeadFilter,
    pub sort_by: SortField,
    pub order_by: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include: LeadInclude,
}

/// Consumer-facing listing parameters, before defaults are applied.
/// `S` is the status the listing filters on: the global lead status, or the
/// campaign-scoped one when listing a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQuery<S = LeadStatus> {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub name: Option<String>,
    pub status: Option<S>,
    pub sort_by: Option<SortField>,
    pub order_by: Option<SortOrder>,
}

pub type CampaignLeadQuery = LeadQuery<LeadCampaignStatus>;

impl<S> Default for LeadQuery<S> {
    fn default() -> Self {
        Self {
            page: None,
            page_size: None,
            name: None,
            status: None,
            sort_by: None,
            order_by: None,
        }
    }
}

impl<S> LeadQuery<S> {
    pub fn page(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: S) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sorted(mut self, sort_by: SortField, order_by: SortOrder) -> Self {
        self.sort_by = Some(sort_by);
        self.order_by = Some(order_by);
        self
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(DEFAULT_PAGE),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    /// Name filter, with blank input treated as absent.
    pub fn name_filter(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Build the repository query for `filter`, applying sort and page defaults.
    pub fn to_find(&self, filter: LeadFilter, include: LeadInclude) -> FindLeads {
        let pagination = self.pagination();
        FindLeads {
            filter,
            sort_by: self.sort_by.unwrap_or_default(),
            order_by: self.order_by.unwrap_or_default(),
            limit: Some(pagination.limit()),
            offset: Some(pagination.offset()),
            include,
        }
    }
}

/// Page number and size, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            page: self.page,
            page_size: self.page_size,
            total,
            total_pages: total / self.page_size + i64::from(total % self.page_size != 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}
