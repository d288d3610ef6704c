use std::collections::HashSet;

use crate::config::RuleThresholds;
use crate::error::Result;
use crate::tx::TransactionRecord;

use super::types::{DetectionRule, RuleContext, RuleResult, Severity};

pub const KNOWN_ATTACKER: &str = "known_attacker";
pub const LARGE_VALUE_TRANSFER: &str = "large_value_transfer";
pub const ABNORMAL_GAS_USAGE: &str = "abnormal_gas_usage";
pub const ABNORMAL_GAS_PRICE: &str = "abnormal_gas_price";
pub const FLASH_LOAN_AMPLIFICATION: &str = "flash_loan_amplification";
pub const SAME_BLOCK_BURST: &str = "same_block_burst";

/// The built-in battery, in evaluation order.
pub fn default_rules(thresholds: &RuleThresholds) -> Vec<Box<dyn DetectionRule>> {
    vec![
        Box::new(KnownAttackerRule),
        Box::new(LargeValueRule {
            threshold_eth: thresholds.large_value_eth,
            high_multiplier: thresholds.large_value_high_multiplier,
        }),
        Box::new(GasUsageRule {
            threshold: thresholds.gas_used_threshold,
        }),
        Box::new(GasPriceRule {
            threshold_gwei: thresholds.gas_price_gwei_threshold,
            medium_multiplier: thresholds.gas_price_medium_multiplier,
        }),
        Box::new(FlashLoanRule {
            threshold_eth: thresholds.flash_loan_value_eth,
        }),
        Box::new(SameBlockBurstRule {
            repeat_threshold: thresholds.same_block_repeat_threshold,
        }),
    ]
}

/// Sender or recipient belongs to a documented exploit.
pub struct KnownAttackerRule;

impl DetectionRule for KnownAttackerRule {
    fn id(&self) -> &str {
        KNOWN_ATTACKER
    }

    fn name(&self) -> &str {
        "Known attacker address"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &str {
        "Sender or recipient is attributed to a known exploit"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        let mut sides = Vec::new();
        let mut indicators: Vec<String> = Vec::new();

        for (side, address) in [("from", ctx.tx.from_address()), ("to", ctx.tx.to_address())] {
            let exploits = ctx.registry.exploits_for(address);
            if exploits.is_empty() {
                continue;
            }
            sides.push(format!("{} address {}", side, address));
            for exploit in exploits {
                if !indicators.contains(&exploit.name) {
                    indicators.push(exploit.name.clone());
                }
            }
        }

        if sides.is_empty() {
            return Ok(RuleResult::clear(self, "Neither address is a known attacker"));
        }

        Ok(RuleResult::triggered(
            self,
            Severity::Critical,
            1.0,
            format!("{} linked to {}", sides.join(" and "), indicators.join(", ")),
            indicators,
        ))
    }
}

/// Value above the large-transfer threshold; HIGH at a multiple of it.
pub struct LargeValueRule {
    pub threshold_eth: f64,
    pub high_multiplier: f64,
}

impl DetectionRule for LargeValueRule {
    fn id(&self) -> &str {
        LARGE_VALUE_TRANSFER
    }

    fn name(&self) -> &str {
        "Large value transfer"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &str {
        "Transferred value exceeds the large-value threshold"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        let value = ctx.tx.value_eth();
        if value <= self.threshold_eth {
            return Ok(RuleResult::clear(
                self,
                format!("{:.2} ETH is within the {:.0} ETH threshold", value, self.threshold_eth),
            ));
        }

        let excess_ratio = (value - self.threshold_eth) / self.threshold_eth;
        let severity = if value >= self.threshold_eth * self.high_multiplier {
            Severity::High
        } else {
            Severity::Medium
        };

        Ok(RuleResult::triggered(
            self,
            severity,
            (0.5 + 0.5 * excess_ratio).min(1.0),
            format!(
                "Transfer of {:.2} ETH exceeds the {:.0} ETH threshold",
                value, self.threshold_eth
            ),
            vec![format!("value_eth_{:.2}_exceeds_{:.0}", value, self.threshold_eth)],
        ))
    }
}

/// Gas consumption typical of complex multi-call exploit contracts.
pub struct GasUsageRule {
    pub threshold: u64,
}

impl DetectionRule for GasUsageRule {
    fn id(&self) -> &str {
        ABNORMAL_GAS_USAGE
    }

    fn name(&self) -> &str {
        "Abnormal gas usage"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &str {
        "Gas used exceeds the threshold for ordinary transactions"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        let gas = ctx.tx.gas_used();
        if gas <= self.threshold {
            return Ok(RuleResult::clear(
                self,
                format!("{} gas is within the {} threshold", gas, self.threshold),
            ));
        }

        let ratio = gas as f64 / self.threshold as f64;
        Ok(RuleResult::triggered(
            self,
            Severity::Medium,
            (0.5 * ratio).min(1.0),
            format!("{} gas used, {:.1}x the {} threshold", gas, ratio, self.threshold),
            vec![format!("gas_used_{}_exceeds_{}", gas, self.threshold)],
        ))
    }
}

/// Priority fee bidding to front-run or race mitigation.
pub struct GasPriceRule {
    pub threshold_gwei: f64,
    pub medium_multiplier: f64,
}

impl DetectionRule for GasPriceRule {
    fn id(&self) -> &str {
        ABNORMAL_GAS_PRICE
    }

    fn name(&self) -> &str {
        "Abnormal gas price"
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &str {
        "Gas price exceeds the threshold, suggesting a race for inclusion"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        let price = ctx.tx.gas_price_gwei();
        if price <= self.threshold_gwei {
            return Ok(RuleResult::clear(
                self,
                format!("{:.1} gwei is within the {:.1} gwei threshold", price, self.threshold_gwei),
            ));
        }

        let ratio = price / self.threshold_gwei;
        let severity = if price >= self.threshold_gwei * self.medium_multiplier {
            Severity::Medium
        } else {
            Severity::Low
        };

        Ok(RuleResult::triggered(
            self,
            severity,
            (0.5 * ratio).min(1.0),
            format!("Gas price {:.1} gwei is {:.1}x the {:.1} gwei threshold", price, ratio, self.threshold_gwei),
            vec![format!("gas_price_{:.1}_gwei_exceeds_{:.1}", price, self.threshold_gwei)],
        ))
    }
}

/// Flash-loan-funded transaction moving more than the amplification threshold.
pub struct FlashLoanRule {
    pub threshold_eth: f64,
}

impl DetectionRule for FlashLoanRule {
    fn id(&self) -> &str {
        FLASH_LOAN_AMPLIFICATION
    }

    fn name(&self) -> &str {
        "Flash loan amplification"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &str {
        "Flash-loan transaction moving a value above the amplification threshold"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        if !ctx.tx.is_flash_loan() {
            return Ok(RuleResult::clear(self, "Not a flash loan transaction"));
        }
        let value = ctx.tx.value_eth();
        if value <= self.threshold_eth {
            return Ok(RuleResult::clear(
                self,
                format!(
                    "Flash loan of {:.2} ETH is below the {:.0} ETH amplification threshold",
                    value, self.threshold_eth
                ),
            ));
        }

        let excess = ((value - self.threshold_eth) / self.threshold_eth).min(1.0);
        Ok(RuleResult::triggered(
            self,
            Severity::High,
            0.6 + 0.4 * excess,
            format!("Flash loan moving {:.2} ETH", value),
            vec![
                "flash_loan".to_string(),
                format!("flash_loan_value_{:.2}_exceeds_{:.0}", value, self.threshold_eth),
            ],
        ))
    }
}

/// The same address showing up repeatedly inside one block.
pub struct SameBlockBurstRule {
    pub repeat_threshold: u32,
}

impl SameBlockBurstRule {
    /// Transactions of `block` in history plus `tx` itself, each counted once.
    fn block_transactions<'a>(
        tx: &'a TransactionRecord,
        history: &'a [TransactionRecord],
        block: u64,
    ) -> Vec<&'a TransactionRecord> {
        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(hash) = tx.tx_hash() {
            seen.insert(hash);
        }
        let mut in_block = vec![tx];
        for h in history.iter().filter(|h| h.block_number() == Some(block)) {
            match h.tx_hash() {
                Some(hash) => {
                    if !seen.insert(hash) {
                        continue;
                    }
                }
                None => {
                    if h == tx {
                        continue;
                    }
                }
            }
            in_block.push(h);
        }
        in_block
    }
}

impl DetectionRule for SameBlockBurstRule {
    fn id(&self) -> &str {
        SAME_BLOCK_BURST
    }

    fn name(&self) -> &str {
        "Same-block burst"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &str {
        "An address of the transaction appears in many transactions of the same block"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult> {
        let block = match ctx.tx.block_number() {
            Some(b) if !ctx.history.is_empty() => b,
            _ => return Ok(RuleResult::clear(self, "No block context supplied")),
        };

        let in_block = Self::block_transactions(ctx.tx, ctx.history, block);
        let (busiest, count) = [ctx.tx.from_address(), ctx.tx.to_address()]
            .into_iter()
            .map(|addr| (addr, in_block.iter().filter(|t| t.involves(addr)).count()))
            .max_by_key(|(_, count)| *count)
            .unwrap_or((ctx.tx.from_address(), 1));

        let threshold = self.repeat_threshold as usize;
        if count <= threshold {
            return Ok(RuleResult::clear(
                self,
                format!("{} transactions from the busiest address in block {}", count, block),
            ));
        }

        let severity = if count >= threshold * 2 {
            Severity::High
        } else {
            Severity::Medium
        };
        Ok(RuleResult::triggered(
            self,
            severity,
            count as f64 / (threshold * 2) as f64,
            format!("{} appears in {} transactions of block {}", busiest, count, block),
            vec![format!("address_{}_in_{}_txs_block_{}", busiest, count, block)],
        ))
    }
}
