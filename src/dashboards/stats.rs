use super::types::*;
use crate::activities::Activity;
use crate::contacts::{Contact, ContactResponse, LeadStatus, LeadTier};
use crate::deals::{Deal, DealStage};
use crate::tasks::{Task, TaskStatus};

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregates dashboard KPIs from full entity snapshots. Nothing here touches
/// storage; callers load the rows and pass them in.
pub fn compute_dashboard_stats(
    contacts: &[Contact],
    activities: &[Activity],
    deals: &[Deal],
    tasks: &[Task],
) -> DashboardStats {
    let active_leads = contacts
        .iter()
        .filter(|c| c.lead_status != LeadStatus::Cold)
        .count();

    let won: Vec<&Deal> = deals
        .iter()
        .filter(|d| d.stage == DealStage::ClosedWon)
        .collect();
    let total_revenue: f64 = won.iter().map(|d| d.value).sum();

    let conversion_rate = if active_leads == 0 {
        0.0
    } else {
        round_one_decimal(won.len() as f64 / active_leads as f64 * 100.0)
    };

    let pipeline_value = deals
        .iter()
        .filter(|d| !d.stage.is_closed())
        .map(|d| d.value)
        .sum();

    let mut distribution = LeadScoreDistribution::default();
    for contact in contacts {
        match contact.tier() {
            LeadTier::Hot => distribution.hot += 1,
            LeadTier::Warm => distribution.warm += 1,
            LeadTier::Cold => distribution.cold += 1,
            LeadTier::New => distribution.new += 1,
        }
    }

    let deals_by_stage = DealStage::ALL
        .into_iter()
        .map(|stage| {
            let in_stage = deals.iter().filter(|d| d.stage == stage);
            StageCount {
                stage,
                count: in_stage.clone().count(),
                value: in_stage.map(|d| d.value).sum(),
            }
        })
        .collect();

    let mut recent: Vec<&Activity> = activities.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent_activities = recent
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .cloned()
        .collect();

    let mut ranked: Vec<&Contact> = contacts.iter().collect();
    ranked.sort_by(|a, b| {
        b.lead_score
            .cmp(&a.lead_score)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
    let top_leads = ranked
        .into_iter()
        .take(TOP_LEADS_LIMIT)
        .cloned()
        .map(ContactResponse::from)
        .collect();

    let pending_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .count();

    DashboardStats {
        total_contacts: contacts.len(),
        active_leads,
        total_revenue,
        conversion_rate,
        pipeline_value,
        lead_score_distribution: distribution,
        deals_by_stage,
        recent_activities,
        top_leads,
        pending_tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::ActivityType;
    use crate::contacts::CreateContactRequest;
    use crate::deals::CreateDealRequest;
    use crate::tasks::CreateTaskRequest;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn contact(score: i32, status: LeadStatus) -> Contact {
        Contact::from_request(
            CreateContactRequest {
                first_name: Some(format!("Lead{score}")),
                last_name: Some("Test".into()),
                email: Some(format!("lead{score}@example.com")),
                lead_score: Some(score),
                lead_status: Some(status),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn deal(stage: DealStage, value: f64) -> Deal {
        Deal::from_request(
            CreateDealRequest {
                title: Some("Deal".into()),
                contact_id: Some(Uuid::new_v4()),
                value: Some(value),
                stage: Some(stage),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_empty_inputs() {
        let stats = compute_dashboard_stats(&[], &[], &[], &[]);
        assert_eq!(stats.total_contacts, 0);
        assert_eq!(stats.active_leads, 0);
        assert_eq!(stats.conversion_rate, 0.0);
        assert_eq!(stats.total_revenue, 0.0);
        assert_eq!(stats.deals_by_stage.len(), DealStage::ALL.len());
        assert!(stats.deals_by_stage.iter().all(|s| s.count == 0));
    }

    #[test]
    fn test_conversion_rate_zero_without_active_leads() {
        let contacts = vec![contact(10, LeadStatus::Cold)];
        let deals = vec![deal(DealStage::ClosedWon, 500.0)];
        let stats = compute_dashboard_stats(&contacts, &[], &deals, &[]);
        assert_eq!(stats.active_leads, 0);
        assert_eq!(stats.conversion_rate, 0.0);
        assert_eq!(stats.total_revenue, 500.0);
    }

    #[test]
    fn test_revenue_counts_closed_won_only() {
        let contacts = vec![
            contact(90, LeadStatus::Hot),
            contact(60, LeadStatus::Warm),
            contact(30, LeadStatus::Contacted),
        ];
        let deals = vec![
            deal(DealStage::ClosedWon, 1000.0),
            deal(DealStage::ClosedLost, 700.0),
            deal(DealStage::Negotiation, 300.0),
        ];
        let stats = compute_dashboard_stats(&contacts, &[], &deals, &[]);
        assert_eq!(stats.total_revenue, 1000.0);
        assert_eq!(stats.pipeline_value, 300.0);
        // 1 won / 3 active
        assert_eq!(stats.conversion_rate, 33.3);

        let won = stats
            .deals_by_stage
            .iter()
            .find(|s| s.stage == DealStage::ClosedWon)
            .unwrap();
        assert_eq!(won.count, 1);
    }

    #[test]
    fn test_distribution_uses_tiers() {
        let contacts = vec![
            contact(95, LeadStatus::Hot),
            contact(80, LeadStatus::New),
            contact(55, LeadStatus::New),
            contact(20, LeadStatus::New),
            contact(5, LeadStatus::New),
        ];
        let stats = compute_dashboard_stats(&contacts, &[], &[], &[]);
        assert_eq!(
            stats.lead_score_distribution,
            LeadScoreDistribution {
                hot: 2,
                warm: 1,
                cold: 1,
                new: 1
            }
        );
        let top: Vec<i32> = stats
            .top_leads
            .iter()
            .map(|c| c.contact.lead_score)
            .collect();
        assert_eq!(top, vec![95, 80, 55, 20, 5]);
    }

    #[test]
    fn test_recent_activities_and_pending_tasks() {
        let contact_id = Uuid::new_v4();
        let base = Utc::now();
        let activities: Vec<Activity> = (0..15)
            .map(|i| {
                let mut a = Activity::new(contact_id, ActivityType::Note, format!("n{i}"), None);
                a.created_at = base + Duration::minutes(i);
                a
            })
            .collect();

        let mut done = Task::from_request(
            CreateTaskRequest {
                title: Some("done".into()),
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            base,
        );
        done.contact_id = Some(contact_id);
        let open = Task::from_request(
            CreateTaskRequest {
                title: Some("open".into()),
                ..Default::default()
            },
            base,
        );

        let stats = compute_dashboard_stats(&[], &activities, &[], &[done, open]);
        assert_eq!(stats.recent_activities.len(), RECENT_ACTIVITY_LIMIT);
        assert_eq!(stats.recent_activities[0].title, "n14");
        assert_eq!(stats.pending_tasks, 1);
    }
}
