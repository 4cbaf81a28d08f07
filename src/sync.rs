/// Sync orchestration
///
/// One run:
/// 1. Log in to Salesforce
/// 2. Open the tracker sheet and load the processed-email set
/// 3. Replay journaled rows from a previous run
/// 4. Query candidate leads
/// 5. For each new lead: validate (Debounce) -> push (Smartlead) -> log (Sheets)
/// 6. In colleague mode, repeat step 5 for the contacts of every synced lead's account
use crate::config::Config;
use crate::debounce::DebounceClient;
use crate::errors::{AppError, ResultExt};
use crate::journal::{JournalEntry, UnloggedJournal};
use crate::models::{
    CampaignLead, CandidateLead, SyncMode, SyncSummary, TrackingEntry, ValidationVerdict,
};
use crate::salesforce::SalesforceSession;
use crate::sheets::TrackerSheet;
use crate::smartlead::SmartleadClient;
use chrono::{DateTime, Local, Utc};
use std::collections::HashSet;

/// What happened to one email that reached validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Pushed and written to the tracker.
    Logged,
    /// Pushed, but the tracker append failed; kept in the local journal.
    Journaled,
    /// Pushed, but neither the tracker nor the journal accepted the row.
    Unrecorded,
    /// Debounce class not accepted.
    Rejected,
    /// Debounce call failed.
    Anomaly,
    /// Smartlead did not answer 200/201.
    PushFailed,
}

impl RecordOutcome {
    /// Whether the email reached the campaign.
    pub fn pushed(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Logged | RecordOutcome::Journaled | RecordOutcome::Unrecorded
        )
    }
}

/// Entry point used by the binaries: load config, run, log the result.
///
/// Fatal conditions are logged and reported as `None`; the process still exits normally.
pub async fn run(mode: SyncMode) -> Option<SyncSummary> {
    tracing::info!("🚀 Starting {}: {}", mode_name(mode), Local::now());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {}", e);
            return None;
        }
    };

    match run_with_config(&config, mode).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!("❌ {} aborted: {}", mode_name(mode), e);
            None
        }
    }
}

/// Runs one full sync with an explicit configuration.
pub async fn run_with_config(config: &Config, mode: SyncMode) -> Result<SyncSummary, AppError> {
    let mut sync = LeadSync::connect(config, mode).await?;
    sync.replay_journal().await?;
    sync.run(Utc::now()).await
}

fn mode_name(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::LeadsOnly => "Negative Review sync",
        SyncMode::WithColleagues => "Negative Review colleague sync",
    }
}

/// Owns the clients and the in-memory processed set for one run.
pub struct LeadSync {
    mode: SyncMode,
    salesforce: SalesforceSession,
    validator: DebounceClient,
    campaign: SmartleadClient,
    tracker: TrackerSheet,
    journal: UnloggedJournal,
    processed: HashSet<String>,
    summary: SyncSummary,
}

impl LeadSync {
    /// Performs the setup steps; any failure here aborts the run before anything is written.
    pub async fn connect(config: &Config, mode: SyncMode) -> Result<Self, AppError> {
        let salesforce = SalesforceSession::login(config).await.map_err(|e| {
            tracing::error!("❌ Salesforce login failed: {}", e);
            e
        })?;

        let tracker = TrackerSheet::connect(config, mode)
            .await
            .context("Tracker sheet unavailable")?;

        let processed = tracker
            .read_processed_emails()
            .await
            .context("Loading processed emails")?;
        tracing::info!("Tracker already holds {} email(s)", processed.len());

        Ok(Self {
            mode,
            salesforce,
            validator: DebounceClient::new(config)?,
            campaign: SmartleadClient::new(config)?,
            tracker,
            journal: UnloggedJournal::new(config.journal_path.clone()),
            processed,
            summary: SyncSummary::default(),
        })
    }

    /// Appends rows an earlier run of this mode journaled for this tracker and
    /// marks their emails processed. Rows for another tracker stay in the journal.
    pub async fn replay_journal(&mut self) -> Result<(), AppError> {
        let pending = self.journal.pending().await?;
        let (own, mut remaining): (Vec<JournalEntry>, Vec<JournalEntry>) = pending
            .into_iter()
            .partition(|e| e.belongs_to(self.mode, self.tracker.spreadsheet_id()));

        if !remaining.is_empty() {
            tracing::info!(
                "Leaving {} journaled row(s) for another tracker untouched",
                remaining.len()
            );
        }
        if own.is_empty() {
            return Ok(());
        }
        tracing::info!("Replaying {} journaled tracker row(s)", own.len());

        for entry in own {
            // Already in the sheet: an earlier replay appended it but could not compact
            if !self.processed.insert(entry.row.email.clone()) {
                continue;
            }
            match self.tracker.append(&entry.row).await {
                Ok(()) => self.summary.replayed += 1,
                Err(e) => {
                    tracing::warn!("Journal replay for {} failed again: {}", entry.row.email, e);
                    remaining.push(entry);
                }
            }
        }

        if let Err(e) = self.journal.rewrite(&remaining).await {
            tracing::warn!("Could not compact journal: {}", e);
        }
        Ok(())
    }

    /// Queries candidates and syncs each in order.
    pub async fn run(mut self, now: DateTime<Utc>) -> Result<SyncSummary, AppError> {
        let leads = self
            .salesforce
            .fetch_candidate_leads(now)
            .await
            .context("Querying candidate leads")?;
        tracing::info!("📄 Found {} Negative Review lead(s)", leads.len());
        self.summary.candidates = leads.len();

        for lead in &leads {
            self.sync_lead(lead).await;
        }

        let s = &self.summary;
        tracing::info!(
            "✅ {} finished: {} lead(s) and {} contact(s) synced, {} duplicate(s), \
             {} without email, {} rejected, {} validation anomalies, {} push failure(s), \
             {} left the company, {} journaled, {} unrecorded, {} replayed",
            mode_name(self.mode),
            s.leads_synced,
            s.contacts_synced,
            s.duplicates,
            s.missing_email,
            s.rejected,
            s.anomalies,
            s.push_failures,
            s.left_company,
            s.journaled,
            s.unrecorded,
            s.replayed
        );
        Ok(self.summary)
    }

    async fn sync_lead(&mut self, lead: &CandidateLead) {
        if lead.email.is_empty() {
            self.summary.missing_email += 1;
            tracing::debug!("Lead {} has no email, skipping", lead.id);
            return;
        }
        if self.processed.contains(&lead.email) {
            self.summary.duplicates += 1;
            return;
        }

        tracing::info!("⚡ Processing: {} | Account: {}", lead.email, lead.account_name);

        let outcome = self.sync_one(CampaignLead::for_lead(lead, self.mode)).await;
        if outcome.pushed() {
            self.summary.leads_synced += 1;
        }

        if self.mode == SyncMode::WithColleagues && outcome == RecordOutcome::Logged {
            self.sync_colleagues(lead).await;
        }
    }

    async fn sync_colleagues(&mut self, lead: &CandidateLead) {
        if !lead.has_account() {
            tracing::debug!("Lead {} has no account, no colleagues to look up", lead.email);
            return;
        }

        let contacts = match self
            .salesforce
            .fetch_account_contacts(&lead.account_name)
            .await
        {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::warn!(
                    "⚠️  Contact lookup for account {} failed: {}",
                    lead.account_name,
                    e
                );
                return;
            }
        };

        for contact in &contacts {
            if contact.email.is_empty() || self.processed.contains(&contact.email) {
                continue;
            }
            if contact.left_company {
                self.summary.left_company += 1;
                tracing::debug!("Skipping {}: left the company", contact.email);
                continue;
            }

            tracing::info!("   👥 Colleague: {} | Account: {}", contact.email, lead.account_name);

            let outcome = self.sync_one(CampaignLead::for_colleague(contact, lead)).await;
            if outcome.pushed() {
                self.summary.contacts_synced += 1;
            }
        }
    }

    /// validate -> push -> log for one email not yet in the processed set.
    async fn sync_one(&mut self, lead: CampaignLead) -> RecordOutcome {
        match self.validator.check(&lead.email).await {
            ValidationVerdict::Proceed(_) => {}
            ValidationVerdict::Skip(class) => {
                tracing::info!("   Skipping {}: Debounce result '{}'", lead.email, class);
                self.summary.rejected += 1;
                return RecordOutcome::Rejected;
            }
            ValidationVerdict::Anomaly(_) => {
                self.summary.anomalies += 1;
                return RecordOutcome::Anomaly;
            }
        }

        if !self.campaign.push_lead(&lead).await {
            self.summary.push_failures += 1;
            return RecordOutcome::PushFailed;
        }

        // Pushed: never push this email again, whatever happens to the row
        self.processed.insert(lead.email.clone());

        let entry = TrackingEntry::stamped(&lead);
        let Err(e) = self.tracker.append(&entry).await else {
            return RecordOutcome::Logged;
        };
        tracing::error!("❌ Tracker append failed after push: {}", e);

        let journaled = JournalEntry::new(self.mode, self.tracker.spreadsheet_id(), entry);
        match self.journal.record(&journaled).await {
            Ok(()) => {
                self.summary.journaled += 1;
                RecordOutcome::Journaled
            }
            Err(journal_err) => {
                tracing::error!(
                    "❌ Could not journal {}; it may be pushed again next run: {}",
                    journaled.row.email,
                    journal_err
                );
                self.summary.unrecorded += 1;
                RecordOutcome::Unrecorded
            }
        }
    }
}
