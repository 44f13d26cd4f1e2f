//! Points award and promotion, end to end.

use ladder_core::{
    AwardRequest, Error, HistoryCollection, HistoryEntry, LadderConfig, PromotionOutcome, Rank,
};
use ladder_integration_tests::Harness;

fn rank(value: u8) -> Rank {
    Rank::new(value).unwrap()
}

#[tokio::test]
async fn rank_one_without_team_keeps_rank_at_500_points() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let admin = h.operator().await.unwrap();
        let a = h.join("Ayla", None).await.unwrap();
        h.set_rank(&a.id, 1).await.unwrap();
        // A team, but nobody in it at rank 1 yet
        for name in ["Tarik", "Umay", "Vural"] {
            h.join(name, Some(&a)).await.unwrap();
        }

        let receipt = h
            .ladder
            .award_points(&admin, &AwardRequest::new(&a.id, 500, "quarter bonus"))
            .await
            .unwrap();
        assert_eq!(receipt.new_points, 500, "{}", h.backend);
        assert!(matches!(receipt.promotion, Ok(PromotionOutcome::NoChange)));

        let stored = h.store().get_user(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.points, 500);
        assert_eq!(stored.rank, rank(1));
        let points = h.ladder.history(HistoryCollection::Points, &a.id).await.unwrap();
        assert_eq!(points.len(), 1);
        assert!(h
            .ladder
            .history(HistoryCollection::Promotion, &a.id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn rank_one_with_qualifying_team_is_promoted() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let admin = h.operator().await.unwrap();
        let a = h.join("Ayla", None).await.unwrap();
        h.set_rank(&a.id, 1).await.unwrap();

        // One direct referral, and two more below it
        let b = h.join("Bora", Some(&a)).await.unwrap();
        let c = h.join("Cem", Some(&b)).await.unwrap();
        let d = h.join("Deniz", Some(&c)).await.unwrap();
        for id in [&b.id, &c.id, &d.id] {
            h.set_rank(id, 1).await.unwrap();
        }

        let receipt = h
            .ladder
            .award_points(&admin, &AwardRequest::new(&a.id, 500, "quarter bonus"))
            .await
            .unwrap();
        assert_eq!(
            receipt.promotion.unwrap(),
            PromotionOutcome::Promoted {
                from: rank(1),
                to: rank(2)
            },
            "{}",
            h.backend
        );

        let stored = h.store().get_user(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.points, 500);
        assert_eq!(stored.rank, rank(2));

        let promotions = h
            .ladder
            .history(HistoryCollection::Promotion, &a.id)
            .await
            .unwrap();
        assert_eq!(promotions.len(), 1);
        match &promotions[0].entry {
            HistoryEntry::Promotion(p) => assert_eq!((p.from_rank, p.to_rank), (rank(1), rank(2))),
            other => panic!("unexpected entry {:?}", other),
        }
    }
}

#[tokio::test]
async fn non_positive_award_leaves_store_untouched() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let admin = h.operator().await.unwrap();
        let a = h.join("Ayla", None).await.unwrap();
        for delta in [0, -10] {
            let err = h
                .ladder
                .award_points(&admin, &AwardRequest::new(&a.id, delta, "oops"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{}", h.backend);
        }
        assert_eq!(h.store().get_user(&a.id).await.unwrap().unwrap(), a);
        assert!(h
            .ladder
            .history(HistoryCollection::Points, &a.id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn entry_threshold_is_exactly_one_hundred() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let a = h.join("Ayla", None).await.unwrap();
        assert_eq!(
            h.ladder.evaluate_promotion(&a.id, 99).await.unwrap(),
            PromotionOutcome::NoChange
        );
        assert_eq!(
            h.ladder.evaluate_promotion(&a.id, 100).await.unwrap(),
            PromotionOutcome::Promoted {
                from: rank(0),
                to: rank(1)
            }
        );
    }
}

#[tokio::test]
async fn rank_two_quorum_boundary() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let lead = h.join("Lead", None).await.unwrap();
        h.set_rank(&lead.id, 2).await.unwrap();
        let mut members = Vec::new();
        for name in ["M0", "M1", "M2"] {
            members.push(h.join(name, Some(&lead)).await.unwrap());
        }
        h.set_rank(&members[0].id, 2).await.unwrap();
        h.set_rank(&members[1].id, 3).await.unwrap();

        assert_eq!(
            h.ladder.evaluate_promotion(&lead.id, 0).await.unwrap(),
            PromotionOutcome::NoChange,
            "{}",
            h.backend
        );

        h.set_rank(&members[2].id, 2).await.unwrap();
        assert_eq!(
            h.ladder.evaluate_promotion(&lead.id, 0).await.unwrap(),
            PromotionOutcome::Promoted {
                from: rank(2),
                to: rank(3)
            }
        );
    }
}

#[tokio::test]
async fn top_rank_is_terminal() {
    for h in Harness::all(LadderConfig::default()).unwrap() {
        let lead = h.join("Lead", None).await.unwrap();
        h.set_rank(&lead.id, 5).await.unwrap();
        for name in ["M0", "M1", "M2", "M3"] {
            let m = h.join(name, Some(&lead)).await.unwrap();
            h.set_rank(&m.id, 5).await.unwrap();
        }
        assert_eq!(
            h.ladder.evaluate_promotion(&lead.id, u64::MAX).await.unwrap(),
            PromotionOutcome::NoChange
        );
        assert_eq!(
            h.store().get_user(&lead.id).await.unwrap().unwrap().rank,
            Rank::TOP
        );
    }
}
