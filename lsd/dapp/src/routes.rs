use lsd_dapp_interface::FundingPool;

/// Navigable pages of the dApp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    SignIn,
    Manage,
    StakingRewards,
    FeesRewards,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Home,
        Route::SignIn,
        Route::Manage,
        Route::StakingRewards,
        Route::FeesRewards,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::SignIn => "/sign-in",
            Route::Manage => "/manage",
            Route::StakingRewards => "/manage/rewards/staking",
            Route::FeesRewards => "/manage/rewards/fees",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::SignIn => "Sign in",
            Route::Manage => "Manage",
            Route::StakingRewards => "Staking rewards",
            Route::FeesRewards => "Fees and MEV rewards",
        }
    }

    /// Parses a location path. A trailing slash and a query string are
    /// ignored.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL
            .into_iter()
            .find(|route| route.path() == normalized)
    }

    /// Pages that only make sense with a connected wallet.
    pub const fn requires_account(self) -> bool {
        matches!(
            self,
            Route::Manage | Route::StakingRewards | Route::FeesRewards
        )
    }

    /// Page shown after a wallet connects from the sign-in page.
    pub const fn after_sign_in() -> Route {
        Route::Manage
    }

    /// Rewards page reached from a finished deposit into `pool`.
    pub const fn rewards_for(pool: FundingPool) -> Route {
        match pool {
            FundingPool::SavEth => Route::StakingRewards,
            FundingPool::FeesAndMev => Route::FeesRewards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_parses_back_from_its_path() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }

    #[test]
    fn paths_tolerate_trailing_slashes_and_queries() {
        assert_eq!(Route::from_path("/manage/"), Some(Route::Manage));
        assert_eq!(Route::from_path("/sign-in?next=/manage"), Some(Route::SignIn));
        assert_eq!(Route::from_path(""), Some(Route::Home));
        assert_eq!(Route::from_path("/node_operator"), None);
    }

    #[test]
    fn manage_pages_need_a_wallet() {
        assert!(!Route::Home.requires_account());
        assert!(!Route::SignIn.requires_account());
        assert!(Route::after_sign_in().requires_account());
        assert_eq!(Route::rewards_for(FundingPool::FeesAndMev).path(), "/manage/rewards/fees");
    }
}
